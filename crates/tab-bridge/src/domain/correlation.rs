//! Request identifier used to pair outbound commands with browser replies.
//!
//! Freshly minted identifiers are UUID v7 strings. Replies echo whatever
//! string the command carried, so parsing accepts any non-empty string.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Correlation identifier embedded in a command and echoed by its reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Mint a new identifier (UUID v7, time-ordered and unique per process).
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Wrap an identifier received on the wire.
    ///
    /// Returns `None` for an empty string, which can never match a minted id.
    pub fn from_wire(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            None
        } else {
            Some(Self(raw.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RequestId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_new_request_ids_are_distinct() {
        let ids: HashSet<RequestId> = (0..10_000).map(|_| RequestId::new()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn test_request_id_is_uuid_formatted() {
        let id = RequestId::new();
        assert_eq!(id.as_str().len(), 36);
        assert!(Uuid::parse_str(id.as_str()).is_ok());
    }

    #[test]
    fn test_from_wire_rejects_empty() {
        assert!(RequestId::from_wire("").is_none());
        assert_eq!(
            RequestId::from_wire("1700000000.123").unwrap().as_str(),
            "1700000000.123"
        );
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let id = RequestId::from_wire("abc").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    }
}
