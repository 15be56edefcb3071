// ── Partial property updates ──
//
// Merging a partial body into the current property value. Byte ranges
// work for any media type; JSON pointer maps only for JSON bodies and
// only replace values whose path already exists.

use bytes::Bytes;
use serde_json::Value;

use crate::error::CoreError;
use crate::model::PropertyValue;
use crate::port::PartialUpdate;

pub(crate) fn merge(
    current: &PropertyValue,
    partial: PartialUpdate,
    patch: &[u8],
) -> Result<Bytes, CoreError> {
    match partial {
        PartialUpdate::ByteRange { offset } => merge_byte_range(current, offset, patch),
        PartialUpdate::JsonPointer => merge_json_pointers(current, patch),
    }
}

fn merge_byte_range(
    current: &PropertyValue,
    offset: usize,
    patch: &[u8],
) -> Result<Bytes, CoreError> {
    let len = current.body.len();
    if offset > len {
        return Err(CoreError::reconciliation(format!(
            "partial update for '{}' at offset {offset} is past the end of a {len}-byte body",
            current.id
        )));
    }

    let end = offset + patch.len();
    let mut body = current.body.to_vec();
    if end > body.len() {
        body.resize(end, 0);
    }
    body[offset..end].copy_from_slice(patch);
    Ok(Bytes::from(body))
}

fn merge_json_pointers(current: &PropertyValue, patch: &[u8]) -> Result<Bytes, CoreError> {
    if !current.is_json() {
        return Err(CoreError::reconciliation(format!(
            "JSON pointer update for '{}' whose media type is {}",
            current.id, current.media_type
        )));
    }

    let mut doc: Value = serde_json::from_slice(&current.body).map_err(|e| {
        CoreError::reconciliation(format!("current body of '{}' is not JSON: {e}", current.id))
    })?;
    let updates: Value = serde_json::from_slice(patch).map_err(|e| {
        CoreError::reconciliation(format!("partial body for '{}' is not JSON: {e}", current.id))
    })?;
    let Value::Object(updates) = updates else {
        return Err(CoreError::reconciliation(format!(
            "partial body for '{}' must be a JSON object of pointers",
            current.id
        )));
    };

    for (pointer, value) in updates {
        if let Some(path) = parse_pointer(&pointer) {
            replace_existing(&mut doc, &path, value);
        }
    }

    serde_json::to_vec(&doc)
        .map(Bytes::from)
        .map_err(|e| CoreError::Internal(format!("re-encoding '{}': {e}", current.id)))
}

/// Split an RFC 6901 pointer into unescaped reference tokens.
fn parse_pointer(pointer: &str) -> Option<Vec<String>> {
    let rest = pointer.strip_prefix('/')?;
    let mut tokens: Vec<String> = rest
        .split('/')
        .map(|t| t.replace("~1", "/").replace("~0", "~"))
        .collect();
    if tokens.last().is_some_and(String::is_empty) {
        tokens.pop();
    }
    (!tokens.is_empty()).then_some(tokens)
}

/// Walk object members along `path`; replace the leaf only if every
/// segment exists.
fn replace_existing(doc: &mut Value, path: &[String], value: Value) {
    let Some((leaf, parents)) = path.split_last() else {
        return;
    };

    let mut node = doc;
    for key in parents {
        let Value::Object(map) = node else {
            return;
        };
        let Some(next) = map.get_mut(key) else {
            return;
        };
        node = next;
    }

    if let Value::Object(map) = node {
        if let Some(slot) = map.get_mut(leaf) {
            *slot = value;
        }
    }
}
