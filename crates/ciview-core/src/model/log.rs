// ── Transport log ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum MessageDirection {
    In,
    Out,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub direction: MessageDirection,
    pub message: String,
}

impl LogEntry {
    /// Stamp a new entry with the current time.
    pub fn now(direction: MessageDirection, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            direction,
            message: message.into(),
        }
    }
}
