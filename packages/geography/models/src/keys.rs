//! Partition and geography keys.
//!
//! Partition keys arrive as strings from the surrounding orchestration
//! layer: `"9.1"`-style `state.sequence` codes for metropolitan zones,
//! and 4- or 5-digit `CVEGEO` codes for municipalities. They are parsed
//! once here into tagged variants; nothing downstream inspects string
//! shape or code length again.

use thiserror::Error;

/// Number of Mexican states (entity codes 1..=32).
pub const STATE_COUNT: u8 = 32;

/// Errors raised while parsing partition keys.
#[derive(Debug, Error)]
pub enum KeyError {
    /// The key matched neither the zone nor the municipality shape.
    #[error("Partition key '{raw}' is neither a zone key (state.seq) nor a CVEGEO")]
    Malformed {
        /// The rejected input.
        raw: String,
    },

    /// The state code was outside 1..=32.
    #[error("Partition key '{raw}' has state code {state} outside 1..={STATE_COUNT}")]
    StateOutOfRange {
        /// The rejected input.
        raw: String,
        /// The out-of-range state code.
        state: u8,
    },
}

/// A parsed partition key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum PartitionKey {
    /// A metropolitan zone, keyed `state.seq` (e.g. `"9.1"`).
    Zone {
        /// State (entity) code, 1..=32.
        state: u8,
        /// Zone sequence number within the state.
        seq: u16,
    },
    /// A municipality, keyed by its `CVEGEO`.
    Municipality {
        /// State (entity) code, 1..=32.
        state: u8,
        /// Three-digit municipality code within the state.
        mun: u16,
    },
}

impl PartitionKey {
    /// Parses a raw partition key.
    ///
    /// Keys containing a dot are zone keys; 4- or 5-digit numeric keys
    /// are municipality `CVEGEO`s (the leading state code is one digit
    /// in the 4-character form).
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] for any other shape or an out-of-range
    /// state code.
    pub fn parse(raw: &str) -> Result<Self, KeyError> {
        let malformed = || KeyError::Malformed {
            raw: raw.to_string(),
        };

        let key = if let Some((state_part, seq_part)) = raw.split_once('.') {
            let state: u8 = state_part.parse().map_err(|_| malformed())?;
            let seq: u16 = seq_part.parse().map_err(|_| malformed())?;
            Self::Zone { state, seq }
        } else {
            if !(4..=5).contains(&raw.len()) || !raw.bytes().all(|b| b.is_ascii_digit()) {
                return Err(malformed());
            }
            let split = raw.len() - 3;
            let state: u8 = raw[..split].parse().map_err(|_| malformed())?;
            let mun: u16 = raw[split..].parse().map_err(|_| malformed())?;
            Self::Municipality { state, mun }
        };

        let state = key.state();
        if state == 0 || state > STATE_COUNT {
            return Err(KeyError::StateOutOfRange {
                raw: raw.to_string(),
                state,
            });
        }
        Ok(key)
    }

    /// The state (entity) code of this partition.
    #[must_use]
    pub const fn state(&self) -> u8 {
        match self {
            Self::Zone { state, .. } | Self::Municipality { state, .. } => *state,
        }
    }

    /// The zero-padded two-digit state code, as used in file names.
    #[must_use]
    pub fn state_code(&self) -> String {
        format!("{:02}", self.state())
    }
}

impl std::fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Zone { state, seq } => write!(f, "{state}.{seq}"),
            Self::Municipality { state, mun } => write!(f, "{state}{mun:03}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_zone_key() {
        let key = PartitionKey::parse("9.1").unwrap();
        assert_eq!(key, PartitionKey::Zone { state: 9, seq: 1 });
        assert_eq!(key.to_string(), "9.1");
        assert_eq!(key.state_code(), "09");
    }

    #[test]
    fn parses_short_cvegeo() {
        let key = PartitionKey::parse("9014").unwrap();
        assert_eq!(key, PartitionKey::Municipality { state: 9, mun: 14 });
        assert_eq!(key.state_code(), "09");
        assert_eq!(key.to_string(), "9014");
    }

    #[test]
    fn parses_long_cvegeo() {
        let key = PartitionKey::parse("25006").unwrap();
        assert_eq!(key, PartitionKey::Municipality { state: 25, mun: 6 });
        assert_eq!(key.state_code(), "25");
    }

    #[test]
    fn rejects_garbage() {
        assert!(PartitionKey::parse("abc").is_err());
        assert!(PartitionKey::parse("123").is_err());
        assert!(PartitionKey::parse("123456").is_err());
        assert!(PartitionKey::parse("9.x").is_err());
    }

    #[test]
    fn rejects_out_of_range_state() {
        let err = PartitionKey::parse("33.1").unwrap_err();
        assert!(err.to_string().contains("33"));
        assert!(PartitionKey::parse("33001").is_err());
    }
}
