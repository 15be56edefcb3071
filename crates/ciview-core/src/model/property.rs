// ── Properties ──
//
// Property values are identified by property id within a connection.
// Metadata follows the MIDI-CI common rules for property exchange;
// field names serialize the way the resource list does on the wire.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub const JSON_MEDIA_TYPE: &str = "application/json";

// ── PropertyValue ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyValue {
    pub id: String,
    pub media_type: String,
    pub body: Bytes,
}

impl PropertyValue {
    pub fn new(id: impl Into<String>, media_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            id: id.into(),
            media_type: media_type.into(),
            body: body.into(),
        }
    }

    pub fn is_json(&self) -> bool {
        is_json_media_type(&self.media_type)
    }

    /// The body as text, if it is valid UTF-8.
    pub fn body_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

/// `application/json`, ignoring parameters such as `; charset=...`.
pub fn is_json_media_type(media_type: &str) -> bool {
    media_type
        .split(';')
        .next()
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(JSON_MEDIA_TYPE))
}

// ── PropertyMetadata ────────────────────────────────────────────────

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SetAccess {
    #[default]
    None,
    Full,
    Partial,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Originator {
    System,
    #[default]
    User,
}

/// What a resource-list column points at. A column has exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnTarget {
    Property(String),
    Link(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyColumn {
    pub title: String,
    #[serde(flatten)]
    pub target: ColumnTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PropertyMetadata {
    pub resource: String,
    pub can_get: bool,
    pub can_set: SetAccess,
    pub can_subscribe: bool,
    pub require_res_id: bool,
    pub media_types: Vec<String>,
    pub encodings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Value>,
    pub can_paginate: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<PropertyColumn>,
    pub originator: Originator,
}

impl Default for PropertyMetadata {
    fn default() -> Self {
        Self {
            resource: String::new(),
            can_get: true,
            can_set: SetAccess::None,
            can_subscribe: false,
            require_res_id: false,
            media_types: vec![JSON_MEDIA_TYPE.into()],
            encodings: vec!["ASCII".into()],
            schema: None,
            can_paginate: false,
            columns: Vec::new(),
            originator: Originator::User,
        }
    }
}

impl PropertyMetadata {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            ..Self::default()
        }
    }

    /// First declared media type, falling back to JSON.
    pub fn primary_media_type(&self) -> &str {
        self.media_types
            .first()
            .map_or(JSON_MEDIA_TYPE, String::as_str)
    }
}

// ── Local properties ────────────────────────────────────────────────

/// A property this endpoint exposes as a responder.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalProperty {
    pub metadata: PropertyMetadata,
    pub value: Option<PropertyValue>,
}

impl LocalProperty {
    pub fn id(&self) -> &str {
        &self.metadata.resource
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn metadata_defaults_follow_common_rules() {
        let meta = PropertyMetadata::new("X-Custom");
        assert!(meta.can_get);
        assert_eq!(meta.can_set, SetAccess::None);
        assert!(!meta.can_subscribe);
        assert_eq!(meta.media_types, vec!["application/json".to_owned()]);
        assert_eq!(meta.encodings, vec!["ASCII".to_owned()]);
        assert_eq!(meta.originator, Originator::User);
    }

    #[test]
    fn metadata_parses_resource_list_entry() {
        let json = r#"{
            "resource": "ProgramList",
            "canSet": "partial",
            "canSubscribe": true,
            "columns": [
                {"title": "Name", "property": "name"},
                {"title": "Details", "link": "ProgramInfo"}
            ]
        }"#;
        let meta: PropertyMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.resource, "ProgramList");
        assert_eq!(meta.can_set, SetAccess::Partial);
        assert!(meta.can_subscribe);
        assert!(meta.can_get, "omitted fields keep their defaults");
        assert_eq!(
            meta.columns,
            vec![
                PropertyColumn {
                    title: "Name".into(),
                    target: ColumnTarget::Property("name".into()),
                },
                PropertyColumn {
                    title: "Details".into(),
                    target: ColumnTarget::Link("ProgramInfo".into()),
                },
            ]
        );
    }

    #[test]
    fn column_serializes_single_target_key() {
        let column = PropertyColumn {
            title: "Name".into(),
            target: ColumnTarget::Link("ProgramInfo".into()),
        };
        let value = serde_json::to_value(&column).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"title": "Name", "link": "ProgramInfo"})
        );
    }

    #[test]
    fn json_media_type_ignores_parameters() {
        assert!(is_json_media_type("application/json"));
        assert!(is_json_media_type("Application/JSON; charset=utf-8"));
        assert!(!is_json_media_type("application/octet-stream"));
    }
}
