use std::fmt::{Display, Formatter};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// An opaque external identity, e.g. a wallet address.
///
/// Hex account addresses (`0x` and 40 hex digits) are case-insensitive and
/// stored in lowercase. Any other identity is compared exactly.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Wrap the given string, rejecting the empty identity.
    pub fn new(identity: impl Into<String>) -> Result<Self> {
        let mut identity = identity.into();
        if identity.is_empty() {
            return Err(Error::BadRequest("Identity must not be empty".to_string()));
        }
        if is_hex_address(&identity) {
            identity.make_ascii_lowercase();
        }
        Ok(Self(identity))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_hex_address(identity: &str) -> bool {
    match identity.strip_prefix("0x").or_else(|| identity.strip_prefix("0X")) {
        Some(digits) => digits.len() == 40 && digits.bytes().all(|b| b.is_ascii_hexdigit()),
        None => false,
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let identity = String::deserialize(deserializer)?;
        Self::new(identity).map_err(serde::de::Error::custom)
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The role an identity holds. An identity holds at most one role at a time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The single, immutable owner fixed at initialisation.
    Owner,
    /// May manage accounts and voting sessions.
    Admin,
    /// May vote in sessions they are registered for.
    Voter,
}

impl Role {
    /// Does this role permit account and session management?
    pub fn is_privileged(self) -> bool {
        match self {
            Role::Owner | Role::Admin => true,
            Role::Voter => false,
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Identity {
        pub fn owner_example() -> Self {
            Self("0xowner".to_string())
        }

        pub fn admin_example() -> Self {
            Self("0xadmin".to_string())
        }

        pub fn voter_example(n: u32) -> Self {
            Self(format!("0xvoter{n}"))
        }

        pub fn stranger_example() -> Self {
            Self("0xstranger".to_string())
        }
    }
}
