//! Session identity.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Session used when a connection does not name one.
pub const DEFAULT_SESSION: &str = "default";

/// Opaque key identifying one logical waveform stream.
///
/// Any number of local subscribers (client side) or transport connections
/// (server side) may share the same `SessionId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Create a session id, trimming surrounding whitespace and rejecting
    /// blank strings. Matches what the server resolves from the query.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let mut id = id.into();
        if id.trim().len() != id.len() {
            id = id.trim().to_string();
        }
        if id.is_empty() {
            return Err(CoreError::InvalidSessionId(
                "session id must not be blank".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Resolve an optional query value, falling back to `default` when the
    /// value is missing or blank.
    pub fn from_query(value: Option<&str>, default: &str) -> Self {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() => Self(v.to_string()),
            _ => Self(default.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self(DEFAULT_SESSION.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for SessionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for SessionId {
    type Error = CoreError;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}
