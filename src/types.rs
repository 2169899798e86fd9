use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::LoanError;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(Uuid);

        impl $name {
            /// new time-ordered identifier
            pub fn generate() -> Self {
                $name(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                $name(uuid)
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }

            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&STANDARD.encode(self.0.as_bytes()))
            }
        }

        impl FromStr for $name {
            type Err = LoanError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let bytes = STANDARD.decode(s).map_err(|e| LoanError::InvalidIdentifier {
                    message: format!("{}: {}", stringify!($name), e),
                })?;
                let uuid = Uuid::from_slice(&bytes).map_err(|e| LoanError::InvalidIdentifier {
                    message: format!("{}: {}", stringify!($name), e),
                })?;
                Ok($name(uuid))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

opaque_id!(
    /// unique identifier for a loan
    LoanId
);

opaque_id!(
    /// unique identifier for a party attached to a loan
    PartyId
);

/// identifier of a user (borrower, lender, officer) owned by an external system
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        UserId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        UserId::new(s)
    }
}

/// loan lifecycle state, strictly ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanState {
    Proposed,
    Approved,
    Invested,
    Disbursed,
}

impl LoanState {
    /// state a loan must be in before entering this one
    pub fn predecessor(&self) -> Option<LoanState> {
        match self {
            LoanState::Proposed => None,
            LoanState::Approved => Some(LoanState::Proposed),
            LoanState::Invested => Some(LoanState::Approved),
            LoanState::Disbursed => Some(LoanState::Invested),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoanState::Proposed => "proposed",
            LoanState::Approved => "approved",
            LoanState::Invested => "invested",
            LoanState::Disbursed => "disbursed",
        }
    }
}

impl fmt::Display for LoanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// role a party plays on a loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyRole {
    Borrower,
    Lender,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_text_roundtrip() {
        let id = LoanId::generate();
        let text = id.to_string();
        assert_eq!(text.len(), 24);
        assert_eq!(text.parse::<LoanId>().unwrap(), id);
    }

    #[test]
    fn test_id_rejects_bad_text() {
        assert!(matches!(
            "not base64!".parse::<LoanId>(),
            Err(LoanError::InvalidIdentifier { .. })
        ));
        // valid base64, wrong length
        assert!("AAAA".parse::<PartyId>().is_err());
    }

    #[test]
    fn test_ids_are_time_ordered() {
        let first = LoanId::generate();
        let second = LoanId::generate();
        assert!(first < second);
    }

    #[test]
    fn test_state_predecessors() {
        assert_eq!(LoanState::Proposed.predecessor(), None);
        assert_eq!(LoanState::Approved.predecessor(), Some(LoanState::Proposed));
        assert_eq!(LoanState::Invested.predecessor(), Some(LoanState::Approved));
        assert_eq!(LoanState::Disbursed.predecessor(), Some(LoanState::Invested));
    }
}
