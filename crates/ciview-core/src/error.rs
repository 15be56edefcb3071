// ── Core error types ──
//
// Command-side failures are returned to the caller. Event-side failures
// (reconciliation, illegal transitions) never reach a caller; they are
// reported as diagnostics. The `From<PortError>` impl translates protocol
// engine failures into the command-side taxonomy.

use thiserror::Error;

use crate::model::{Muid, SubscriptionState};
use crate::port::PortError;

#[derive(Debug, Error)]
pub enum CoreError {
    // ── Command errors ───────────────────────────────────────────────
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Controller not initialized")]
    NotInitialized,

    #[error("Protocol engine unavailable: {reason}")]
    PortUnavailable { reason: String },

    // ── Event errors ─────────────────────────────────────────────────
    #[error("Reconciliation failed: {message}")]
    Reconciliation { message: String },

    #[error("Illegal subscription transition for '{property_id}' on {target}: {from} -> {to}")]
    IllegalTransition {
        target: Muid,
        property_id: String,
        from: SubscriptionState,
        to: SubscriptionState,
    },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub(crate) fn reconciliation(message: impl Into<String>) -> Self {
        Self::Reconciliation {
            message: message.into(),
        }
    }

    pub(crate) fn unknown_target(target: Muid) -> Self {
        Self::reconciliation(format!("event references unknown connection {target}"))
    }
}

// ── Conversion from protocol engine errors ───────────────────────────

impl From<PortError> for CoreError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::Unavailable(reason) => CoreError::PortUnavailable { reason },
            PortError::Rejected(message) => CoreError::InvalidArgument { message },
            PortError::NotInitialized => CoreError::NotInitialized,
        }
    }
}
