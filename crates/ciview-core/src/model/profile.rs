// ── Profiles ──
//
// A profile is addressed by (group, address, 5-byte id) inside one
// connection. Two reports with the same key describe the same profile.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ── ProfileId ───────────────────────────────────────────────────────

/// Fixed 5-byte MIDI-CI profile identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct ProfileId([u8; 5]);

impl ProfileId {
    pub const LEN: usize = 5;

    pub const fn new(bytes: [u8; 5]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 5] {
        &self.0
    }
}

impl TryFrom<&[u8]> for ProfileId {
    type Error = CoreError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        <[u8; 5]>::try_from(bytes)
            .map(Self)
            .map_err(|_| CoreError::InvalidArgument {
                message: format!(
                    "profile id must be exactly {} bytes, got {}",
                    Self::LEN,
                    bytes.len()
                ),
            })
    }
}

impl TryFrom<Vec<u8>> for ProfileId {
    type Error = CoreError;

    fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
        Self::try_from(bytes.as_slice())
    }
}

impl From<ProfileId> for Vec<u8> {
    fn from(id: ProfileId) -> Self {
        id.0.to_vec()
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e] = self.0;
        write!(f, "{a:02X} {b:02X} {c:02X} {d:02X} {e:02X}")
    }
}

impl FromStr for ProfileId {
    type Err = CoreError;

    /// Parses hex bytes separated by spaces, `:` or `-`, or ten contiguous
    /// hex digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidArgument {
            message: format!("'{s}' is not a valid profile id"),
        };

        let tokens: Vec<&str> = s
            .split(|c: char| c.is_whitespace() || c == ':' || c == '-')
            .filter(|t| !t.is_empty())
            .collect();

        let contiguous = match tokens.as_slice() {
            [single] if single.is_ascii() && single.len() == Self::LEN * 2 => Some(*single),
            _ => None,
        };

        let bytes: Vec<u8> = if let Some(digits) = contiguous {
            (0..Self::LEN)
                .map(|i| u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16))
                .collect::<Result<_, _>>()
                .map_err(|_| invalid())?
        } else {
            tokens
                .iter()
                .map(|t| u8::from_str_radix(t.trim_start_matches("0x"), 16))
                .collect::<Result<_, _>>()
                .map_err(|_| invalid())?
        };

        Self::try_from(bytes.as_slice())
    }
}

// ── ProfileAddress ──────────────────────────────────────────────────

/// Profile address: a channel (`0x00..=0x0F`), the whole group (`0x7E`),
/// or the whole function block (`0x7F`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ProfileAddress(u8);

impl ProfileAddress {
    pub const GROUP: Self = Self(0x7E);
    pub const FUNCTION_BLOCK: Self = Self(0x7F);
    pub const MAX: u8 = 0x7F;

    pub fn new(value: u8) -> Result<Self, CoreError> {
        if value > Self::MAX {
            return Err(CoreError::InvalidArgument {
                message: format!("profile address {value} is out of range 0..=127"),
            });
        }
        Ok(Self(value))
    }

    pub const fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for ProfileAddress {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProfileAddress> for u8 {
    fn from(address: ProfileAddress) -> Self {
        address.0
    }
}

impl fmt::Display for ProfileAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::GROUP => f.write_str("Group"),
            Self::FUNCTION_BLOCK => f.write_str("Function Block"),
            Self(channel) => write!(f, "0x{channel:02X}"),
        }
    }
}

// ── ProfileGroup ────────────────────────────────────────────────────

/// UMP group a profile lives on, or the wildcard matching any group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<u8>", into = "Option<u8>")]
pub enum ProfileGroup {
    Any,
    Index(u8),
}

impl From<Option<u8>> for ProfileGroup {
    fn from(value: Option<u8>) -> Self {
        value.map_or(Self::Any, Self::Index)
    }
}

impl From<ProfileGroup> for Option<u8> {
    fn from(group: ProfileGroup) -> Self {
        match group {
            ProfileGroup::Any => None,
            ProfileGroup::Index(g) => Some(g),
        }
    }
}

impl From<u8> for ProfileGroup {
    fn from(value: u8) -> Self {
        Self::Index(value)
    }
}

impl fmt::Display for ProfileGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Index(g) => write!(f, "{g}"),
        }
    }
}

impl FromStr for ProfileGroup {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "*" | "any" => Ok(Self::Any),
            other => other
                .parse::<u8>()
                .map(Self::Index)
                .map_err(|_| CoreError::InvalidArgument {
                    message: format!("'{s}' is not a valid group (0-255 or '*')"),
                }),
        }
    }
}

// ── ProfileKey / ProfileState ───────────────────────────────────────

/// Composite identity of a profile within a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileKey {
    pub group: ProfileGroup,
    pub address: ProfileAddress,
    pub profile_id: ProfileId,
}

impl fmt::Display for ProfileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] group {} / {}",
            self.profile_id, self.group, self.address
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileState {
    pub group: ProfileGroup,
    pub address: ProfileAddress,
    pub profile_id: ProfileId,
    pub enabled: bool,
    pub num_channels_requested: u16,
}

impl ProfileState {
    pub fn key(&self) -> ProfileKey {
        ProfileKey {
            group: self.group,
            address: self.address,
            profile_id: self.profile_id,
        }
    }
}
