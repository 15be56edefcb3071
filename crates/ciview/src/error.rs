//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use ciview_config::ConfigError;
use ciview_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Protocol engine ──────────────────────────────────────────────
    #[error("Protocol engine unavailable: {reason}")]
    #[diagnostic(
        code(ciview::engine_unavailable),
        help("Check that a MIDI endpoint is selected.\nTry: ciview devices list")
    )]
    EngineUnavailable { reason: String },

    #[error("Controller is not ready")]
    #[diagnostic(code(ciview::not_ready))]
    NotReady,

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(ciview::not_found),
        help("Run: ciview {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(ciview::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(
        code(ciview::config),
        help("Check the config file, or pass --config to use another one.")
    )]
    Config(Box<figment::Error>),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Timed out after {millis}ms waiting for {what}")]
    #[diagnostic(
        code(ciview::timeout),
        help("The responder did not confirm in time. Lower --delay-ms or retry.")
    )]
    Timeout { what: String, millis: u64 },

    // ── Internal ─────────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(code(ciview::internal))]
    Internal { message: String },
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::EngineUnavailable { .. } => exit_code::CONNECTION,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::Config(_) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    pub fn validation(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidArgument { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },
            CoreError::NotInitialized => CliError::NotReady,
            CoreError::PortUnavailable { reason } => CliError::EngineUnavailable { reason },
            other @ (CoreError::Reconciliation { .. }
            | CoreError::IllegalTransition { .. }
            | CoreError::Internal(_)) => CliError::Internal {
                message: other.to_string(),
            },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::Figment(err) => CliError::Config(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_exit_codes() {
        let invalid: CliError = CoreError::InvalidArgument {
            message: "bad".into(),
        }
        .into();
        assert_eq!(invalid.exit_code(), exit_code::USAGE);

        let unavailable: CliError = CoreError::PortUnavailable {
            reason: "no port".into(),
        }
        .into();
        assert_eq!(unavailable.exit_code(), exit_code::CONNECTION);

        let internal: CliError = CoreError::Internal("boom".into()).into();
        assert_eq!(internal.exit_code(), exit_code::GENERAL);
    }

    #[test]
    fn config_validation_is_a_usage_error() {
        let err: CliError = ConfigError::Validation {
            field: "mock.muid".into(),
            reason: "not a muid".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::USAGE);
        assert!(err.to_string().contains("mock.muid"));
    }
}
