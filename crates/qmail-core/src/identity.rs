//! Identity handles.
//!
//! An identity is a mail address naming one principal. It is normalized to
//! lower case on parse and is passed explicitly into every flow.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest accepted address, in bytes.
pub const MAX_IDENTITY_LEN: usize = 254;

/// Service domain appended to bare usernames at registration.
pub const DEFAULT_DOMAIN: &str = "qmail.co.in";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("identity is empty")]
    Empty,

    #[error("identity exceeds {MAX_IDENTITY_LEN} bytes")]
    TooLong,

    #[error("invalid identity {0:?}: expected local@domain")]
    InvalidAddress(String),
}

/// A validated, normalized `local@domain` address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        let candidate = raw.trim().to_ascii_lowercase();
        if candidate.is_empty() {
            return Err(IdentityError::Empty);
        }
        if candidate.len() > MAX_IDENTITY_LEN {
            return Err(IdentityError::TooLong);
        }
        let valid_chars = candidate
            .chars()
            .all(|c| !c.is_whitespace() && !c.is_control());
        let (local, domain) = candidate
            .split_once('@')
            .ok_or_else(|| IdentityError::InvalidAddress(candidate.clone()))?;
        if !valid_chars || local.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(IdentityError::InvalidAddress(candidate));
        }
        Ok(Self(candidate))
    }

    /// Build `username@domain`, the address assigned at registration.
    pub fn from_username(username: &str, domain: &str) -> Result<Self, IdentityError> {
        Self::parse(&format!("{}@{}", username.trim(), domain.trim()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn domain(&self) -> &str {
        self.0.split_once('@').map_or("", |(_, domain)| domain)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Identity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Identity {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes() {
        let id = Identity::parse("  Alice@QMail.co.in ").unwrap();
        assert_eq!(id.as_str(), "alice@qmail.co.in");
        assert_eq!(id.domain(), "qmail.co.in");
    }

    #[test]
    fn test_from_username() {
        let id = Identity::from_username("bob", DEFAULT_DOMAIN).unwrap();
        assert_eq!(id.to_string(), "bob@qmail.co.in");
    }

    #[test]
    fn test_rejects_invalid() {
        assert_eq!(Identity::parse("   "), Err(IdentityError::Empty));
        assert!(matches!(
            Identity::parse("no-at-sign"),
            Err(IdentityError::InvalidAddress(_))
        ));
        assert!(matches!(
            Identity::parse("@example"),
            Err(IdentityError::InvalidAddress(_))
        ));
        assert!(matches!(
            Identity::parse("a@b@c"),
            Err(IdentityError::InvalidAddress(_))
        ));
        assert!(matches!(
            Identity::parse("a b@example"),
            Err(IdentityError::InvalidAddress(_))
        ));
        let long = format!("{}@example", "x".repeat(MAX_IDENTITY_LEN));
        assert_eq!(Identity::parse(&long), Err(IdentityError::TooLong));
    }

    #[test]
    fn test_serde_validates() {
        let id: Identity = serde_json::from_str("\"Carol@Example\"").unwrap();
        assert_eq!(id.as_str(), "carol@example");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"carol@example\"");
        assert!(serde_json::from_str::<Identity>("\"nope\"").is_err());
    }
}
