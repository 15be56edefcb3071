// ── MUID ──
//
// The 32-bit identifier every MIDI-CI endpoint negotiates for itself.
// Remote connections are keyed by the MUID of the responder.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// MIDI-CI unique identifier.
///
/// Rendered as `0x` followed by eight upper-case hex digits, which is how
/// every log line and table in the workspace prints it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Muid(pub u32);

impl Muid {
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Muid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

impl From<u32> for Muid {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl FromStr for Muid {
    type Err = CoreError;

    /// Accepts `0x`-prefixed hex or plain decimal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let parsed = match trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => trimmed.parse::<u32>(),
        };

        parsed.map(Self).map_err(|_| CoreError::InvalidArgument {
            message: format!("'{s}' is not a valid MUID"),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn display_is_zero_padded_upper_hex() {
        assert_eq!(Muid(0x8765_4321).to_string(), "0x87654321");
        assert_eq!(Muid(0xab).to_string(), "0x000000AB");
    }

    #[test]
    fn parses_hex_and_decimal() {
        assert_eq!("0x87654321".parse::<Muid>().unwrap(), Muid(0x8765_4321));
        assert_eq!("0XFF".parse::<Muid>().unwrap(), Muid(255));
        assert_eq!("42".parse::<Muid>().unwrap(), Muid(42));
    }

    #[test]
    fn rejects_garbage() {
        let err = "0xnope".parse::<Muid>().unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument { .. }));
    }
}
