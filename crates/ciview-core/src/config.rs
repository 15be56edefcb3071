// ── Controller configuration ──
//
// Runtime tunables for a `Controller`. Loading from files and the
// environment lives in `ciview-config`; this is the resolved form.

use std::time::Duration;

/// How much of the transport log the registry keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogRetention {
    #[default]
    Unbounded,
    /// Keep at most this many entries, dropping the oldest first.
    MaxEntries(usize),
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub log_retention: LogRetention,
    /// Pull connections from the port on this interval. `None` disables polling.
    pub poll_interval: Option<Duration>,
    pub command_channel_size: usize,
    /// Capacity of the notification broadcast channel.
    pub event_channel_size: usize,
    /// Mirror reconciliation diagnostics into the transport log.
    pub diagnostics_to_log: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            log_retention: LogRetention::Unbounded,
            poll_interval: None,
            command_channel_size: 64,
            event_channel_size: 256,
            diagnostics_to_log: true,
        }
    }
}
