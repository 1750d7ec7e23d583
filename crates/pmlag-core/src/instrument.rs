//! Instrument identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};

/// Opaque identifier of one tradable outcome token.
///
/// Stable for the lifetime of a session. The venue uses long decimal
/// strings; nothing here interprets the contents.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentId(String);

impl InstrumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build an id, rejecting empty or whitespace-only input.
    pub fn try_new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidInstrument("empty instrument id".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for log lines (`1234…5678`).
    pub fn short(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 12 {
            return self.0.clone();
        }
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}…{tail}")
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for InstrumentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for InstrumentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Wall-clock time in milliseconds since the Unix epoch.
#[inline]
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_new_rejects_blank() {
        assert!(InstrumentId::try_new("  ").is_err());
        assert_eq!(InstrumentId::try_new(" 123 ").unwrap().as_str(), "123");
    }

    #[test]
    fn test_short_form() {
        let id = InstrumentId::new("71321045679252212594626385532706912750332728571942532289631379312455583992563");
        assert_eq!(id.short(), "7132…2563");
        assert_eq!(InstrumentId::new("abc").short(), "abc");
    }
}
