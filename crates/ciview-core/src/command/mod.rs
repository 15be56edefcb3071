// ── Command API ──
//
// All user-initiated operations flow through a unified `Command` enum.
// The controller validates, then hands each variant to the protocol port.
// Nothing here mutates the registry; state changes arrive as events.

pub mod requests;

use bytes::Bytes;

use crate::error::CoreError;
use crate::model::{Muid, ProfileKey, PropertyMetadata};

pub use requests::{
    MAX_PROFILE_CHANNELS, RefreshPropertyRequest, SetProfileRequest, ValidProfileRequest,
};

/// A command envelope sent through the command channel.
/// Contains the command and a oneshot response channel.
pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub response_tx: tokio::sync::oneshot::Sender<Result<CommandResult, CoreError>>,
}

/// Every operation a consumer can ask the protocol engine to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // ── Discovery ────────────────────────────────────────────────────
    SendDiscovery,
    SelectConnection {
        target: Muid,
    },

    // ── Profiles ─────────────────────────────────────────────────────
    SetProfile {
        key: ProfileKey,
        enabled: bool,
        num_channels: u16,
    },

    // ── Remote properties ────────────────────────────────────────────
    SubscribeProperty {
        property_id: String,
        encoding: Option<String>,
    },
    UnsubscribeProperty {
        property_id: String,
    },
    RefreshPropertyValue(RefreshPropertyRequest),

    // ── Local properties ─────────────────────────────────────────────
    CreateProperty {
        metadata: PropertyMetadata,
    },
    UpdatePropertyMetadata {
        property_id: String,
        metadata: PropertyMetadata,
    },
    UpdatePropertyValue {
        property_id: String,
        res_id: Option<String>,
        data: Bytes,
    },
    RemoveProperty {
        property_id: String,
    },

    // ── Transport ────────────────────────────────────────────────────
    ClearLogs,
    GetMuid,
}

impl Command {
    /// Short label for tracing.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SendDiscovery => "send_discovery",
            Self::SelectConnection { .. } => "select_connection",
            Self::SetProfile { .. } => "set_profile",
            Self::SubscribeProperty { .. } => "subscribe_property",
            Self::UnsubscribeProperty { .. } => "unsubscribe_property",
            Self::RefreshPropertyValue(_) => "refresh_property_value",
            Self::CreateProperty { .. } => "create_property",
            Self::UpdatePropertyMetadata { .. } => "update_property_metadata",
            Self::UpdatePropertyValue { .. } => "update_property_value",
            Self::RemoveProperty { .. } => "remove_property",
            Self::ClearLogs => "clear_logs",
            Self::GetMuid => "get_muid",
        }
    }

    /// Argument checks that need no registry state.
    pub(crate) fn validate(&self) -> Result<(), CoreError> {
        match self {
            Self::SetProfile { num_channels, .. } if *num_channels > MAX_PROFILE_CHANNELS => {
                Err(CoreError::invalid(format!(
                    "numChannels must be between 0 and {MAX_PROFILE_CHANNELS}, got {num_channels}"
                )))
            }
            Self::SubscribeProperty { property_id, .. }
            | Self::UnsubscribeProperty { property_id }
            | Self::UpdatePropertyValue { property_id, .. }
            | Self::RemoveProperty { property_id }
            | Self::RefreshPropertyValue(RefreshPropertyRequest { property_id, .. })
                if property_id.is_empty() =>
            {
                Err(CoreError::invalid("property id must not be empty"))
            }
            Self::CreateProperty { metadata } if metadata.resource.is_empty() => {
                Err(CoreError::invalid("property resource must not be empty"))
            }
            Self::UpdatePropertyMetadata {
                property_id,
                metadata,
            } if property_id.is_empty() || metadata.resource.is_empty() => Err(
                CoreError::invalid("property id and resource must not be empty"),
            ),
            _ => Ok(()),
        }
    }
}

/// What a forwarded command produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Accepted by the protocol engine. Effects arrive as events.
    Forwarded,
    Muid(Muid),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProfileAddress, ProfileGroup, ProfileId};

    #[test]
    fn channel_bound_is_checked_on_raw_commands() {
        let key = ProfileKey {
            group: ProfileGroup::Index(0),
            address: ProfileAddress::FUNCTION_BLOCK,
            profile_id: ProfileId::new([0x7E, 0, 1, 2, 3]),
        };
        let cmd = Command::SetProfile {
            key,
            enabled: true,
            num_channels: 17,
        };
        assert!(matches!(cmd.validate(), Err(CoreError::InvalidArgument { .. })));
    }

    #[test]
    fn empty_ids_are_rejected() {
        let cmd = Command::SubscribeProperty {
            property_id: String::new(),
            encoding: None,
        };
        assert!(cmd.validate().is_err());
        assert!(Command::CreateProperty {
            metadata: PropertyMetadata::new("")
        }
        .validate()
        .is_err());
        assert!(Command::SendDiscovery.validate().is_ok());
    }
}
