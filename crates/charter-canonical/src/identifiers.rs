use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::validation::ValidationError;

macro_rules! newtype {
    ($name:ident, $doc:expr, $pattern:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new instance without validation; callers are responsible for conformity.
            pub fn new(value: String) -> Self {
                Self(value)
            }

            /// Parses a validated identifier from a string.
            pub fn parse(value: impl Into<String>) -> Result<Self, ValidationError> {
                static PATTERN: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
                let s = value.into();
                let re = PATTERN.get_or_init(|| Regex::new($pattern).expect("invalid regex"));
                if !re.is_match(&s) {
                    return Err(ValidationError::PatternMismatch {
                        field: stringify!($name),
                        value: s,
                    });
                }
                Ok(Self(s))
            }

            /// Borrows the identifier text.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

newtype!(
    ProfileId,
    "Identifier for canonicalization profiles (pattern: `[A-Za-z0-9_-]{16,128}`)",
    r"^[A-Za-z0-9_-]{16,128}$"
);
newtype!(
    PrincipalId,
    "Stable identifier for keepers, operators and services (`kind:name`, lowercase, URL-safe).",
    r"^(human|service|agent|org|keeper):[a-z][a-z0-9_-]{0,62}$"
);
newtype!(
    EventType,
    "Dotted event tag like `petition.submitted` or `ledger.halt.triggered`.",
    r"^[a-z][a-z0-9_]*([.][a-z][a-z0-9_]*){0,7}$"
);

/// Prefix reserved for the ledger's own governance events.
pub const GOVERNANCE_PREFIX: &str = "ledger.";

impl EventType {
    /// True for the ledger's own audit events (halt, checkpoint, rollback).
    pub fn is_governance(&self) -> bool {
        self.0.starts_with(GOVERNANCE_PREFIX)
    }
}

/// UTC RFC3339 timestamp with `Z` suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(String);

impl Timestamp {
    /// Parses and validates an RFC3339 UTC timestamp.
    pub fn parse(value: impl Into<String>) -> Result<Self, ValidationError> {
        static PATTERN: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
        let s = value.into();
        let re = PATTERN.get_or_init(|| {
            Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d{1,9})?Z$").expect("invalid regex")
        });
        if !re.is_match(&s) || DateTime::parse_from_rfc3339(&s).is_err() {
            return Err(ValidationError::PatternMismatch {
                field: "Timestamp",
                value: s,
            });
        }
        Ok(Self(s))
    }

    /// Formats a chrono instant with microsecond precision.
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at.to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Parsed instant; values built through `parse`/`from_datetime` always convert.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.0)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Borrows the timestamp text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Timestamp {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_governance_prefix() {
        assert!(EventType::parse("ledger.halt.triggered").unwrap().is_governance());
        assert!(!EventType::parse("petition.submitted").unwrap().is_governance());
        assert!(EventType::parse("Petition").is_err());
    }

    #[test]
    fn timestamps_compare_by_instant() {
        let a = Timestamp::parse("2024-01-01T00:00:00Z").unwrap();
        let b = Timestamp::parse("2024-01-01T00:00:00.000500Z").unwrap();
        assert!(a.to_datetime().unwrap() < b.to_datetime().unwrap());
    }

    #[test]
    fn rejects_offset_timestamps() {
        assert!(Timestamp::parse("2024-01-01T00:00:00+02:00").is_err());
        assert!(Timestamp::parse("2024-13-01T00:00:00Z").is_err());
    }

    #[test]
    fn principal_kinds() {
        assert!(PrincipalId::parse("keeper:alice").is_ok());
        assert!(PrincipalId::parse("robot:alice").is_err());
    }
}
