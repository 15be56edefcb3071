// ── Typed request structs for Command payloads ──
//
// Raw, unvalidated user input. Validation turns a request into the
// strongly typed arguments a `Command` carries.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::{ProfileAddress, ProfileGroup, ProfileId, ProfileKey};

/// Upper bound for `num_channels` on a profile request.
pub const MAX_PROFILE_CHANNELS: u16 = 16;

// ── Profiles ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetProfileRequest {
    pub group: ProfileGroup,
    pub address: u8,
    pub profile_id: Vec<u8>,
    pub enabled: bool,
    #[serde(default)]
    pub num_channels: u16,
}

/// A profile request that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidProfileRequest {
    pub key: ProfileKey,
    pub enabled: bool,
    pub num_channels: u16,
}

impl SetProfileRequest {
    pub fn validate(&self) -> Result<ValidProfileRequest, CoreError> {
        if self.num_channels > MAX_PROFILE_CHANNELS {
            return Err(CoreError::invalid(format!(
                "numChannels must be between 0 and {MAX_PROFILE_CHANNELS}, got {}",
                self.num_channels
            )));
        }
        let address = ProfileAddress::new(self.address)?;
        let profile_id = ProfileId::try_from(self.profile_id.as_slice())?;

        Ok(ValidProfileRequest {
            key: ProfileKey {
                group: self.group,
                address,
                profile_id,
            },
            enabled: self.enabled,
            num_channels: self.num_channels,
        })
    }
}

// ── Properties ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshPropertyRequest {
    pub property_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}
