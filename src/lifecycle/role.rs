//! Roles a user may hold on a versioned object.
//!
//! Signer roles are level-gated: `signer0` governs the transition out of
//! the first state, `signer1` the transition out of the second one, and so
//! on. Roles serialize as their string names.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::errors::LifecycleError;

/// A role held through a `UserRoleLink` or delegated through a
/// `DelegationLink`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Owner,
    Notified,
    Reader,
    Signer(u32),
}

fn signer_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^signer(\d+)$").expect("static regex"))
}

impl Role {
    /// Signer role of the given level.
    pub fn signer(level: usize) -> Self {
        Role::Signer(level as u32)
    }

    /// Level of a signer role, `None` for the others.
    pub fn signer_level(&self) -> Option<usize> {
        match self {
            Role::Signer(level) => Some(*level as usize),
            _ => None,
        }
    }

    pub fn is_signer(&self) -> bool {
        matches!(self, Role::Signer(_))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Owner => write!(f, "owner"),
            Role::Notified => write!(f, "notified"),
            Role::Reader => write!(f, "reader"),
            Role::Signer(level) => write!(f, "signer{}", level),
        }
    }
}

impl FromStr for Role {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Role::Owner),
            "notified" => Ok(Role::Notified),
            "reader" => Ok(Role::Reader),
            other => signer_pattern()
                .captures(other)
                .and_then(|caps| caps[1].parse::<u32>().ok())
                .map(Role::Signer)
                .ok_or_else(|| LifecycleError::InvalidRole(other.to_string())),
        }
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
