//! Shared helpers for command handlers.

use std::sync::Arc;
use std::time::Duration;

use ciview_core::{ConnectionSnapshot, Controller, EntityStream, Muid, Snapshot};

use crate::error::CliError;

/// How long a handler waits for the engine to confirm a request.
pub const CONFIRM_TIMEOUT: Duration = Duration::from_secs(5);

/// Wait until the snapshot published on `stream` satisfies `pred`.
pub async fn wait_until<T, F>(
    stream: &mut EntityStream<T>,
    what: &str,
    pred: F,
) -> Result<Snapshot<T>, CliError>
where
    T: Send + Sync + 'static,
    F: Fn(&[Arc<T>]) -> bool,
{
    let wait = async {
        loop {
            let snap = stream.latest();
            if pred(snap.as_slice()) {
                return Ok(snap);
            }
            if stream.changed().await.is_none() {
                return Err(CliError::NotReady);
            }
        }
    };

    tokio::time::timeout(CONFIRM_TIMEOUT, wait)
        .await
        .map_err(|_| CliError::Timeout {
            what: what.into(),
            millis: u64::try_from(CONFIRM_TIMEOUT.as_millis()).unwrap_or(u64::MAX),
        })?
}

/// Send a discovery inquiry and wait for at least one responder.
pub async fn discover(controller: &Controller) -> Result<Snapshot<ConnectionSnapshot>, CliError> {
    let mut connections = controller.connections();
    controller.send_discovery().await?;
    wait_until(&mut connections, "discovery", |snap| !snap.is_empty()).await
}

/// The single responder most commands act on: the first one discovered.
pub async fn primary_connection(controller: &Controller) -> Result<Muid, CliError> {
    let snap = discover(controller).await?;
    snap.first()
        .map(|c| c.target())
        .ok_or_else(|| CliError::NotFound {
            resource_type: "connection".into(),
            identifier: "(any)".into(),
            list_command: "discover".into(),
        })
}

/// Resolve a user-supplied MUID against the discovered connections.
pub fn resolve_connection(
    controller: &Controller,
    identifier: &str,
) -> Result<Arc<ConnectionSnapshot>, CliError> {
    let target: Muid = identifier
        .parse()
        .map_err(|_| CliError::validation("target", format!("'{identifier}' is not a MUID")))?;
    controller
        .connection(target)
        .ok_or_else(|| CliError::NotFound {
            resource_type: "connection".into(),
            identifier: identifier.into(),
            list_command: "connections".into(),
        })
}

/// Parse `0x`-prefixed hex or decimal into a byte.
pub fn parse_byte(field: &str, value: &str) -> Result<u8, CliError> {
    let trimmed = value.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => trimmed.parse::<u8>(),
    };
    parsed.map_err(|_| CliError::validation(field, format!("'{value}' is not a byte (0-255)")))
}
