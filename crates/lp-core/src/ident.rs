//! Validated topic and module identifiers.
//!
//! Identifiers are normalized once at construction: surrounding whitespace is
//! trimmed, ASCII letters are lowercased and inner whitespace becomes `-`.
//! "Past Tense", "past tense " and "past-tense" therefore all name the same
//! topic instead of silently fragmenting progress across three records.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::constants::MAX_ID_LEN;

static ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9_.\-]*$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    Empty,
    TooLong(usize),
    InvalidChars(String),
}

impl fmt::Display for IdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdError::Empty => write!(f, "identifier is empty"),
            IdError::TooLong(len) => {
                write!(f, "identifier is {len} chars, max is {MAX_ID_LEN}")
            }
            IdError::InvalidChars(s) => write!(f, "invalid identifier '{s}'"),
        }
    }
}

impl std::error::Error for IdError {}

fn normalize(raw: &str) -> Result<String, IdError> {
    let normalized = raw
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_ascii_lowercase();

    if normalized.is_empty() {
        return Err(IdError::Empty);
    }
    if normalized.len() > MAX_ID_LEN {
        return Err(IdError::TooLong(normalized.len()));
    }
    if !ID_PATTERN.is_match(&normalized) {
        return Err(IdError::InvalidChars(raw.to_string()));
    }
    Ok(normalized)
}

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn new(raw: &str) -> Result<Self, IdError> {
                normalize(raw).map(Self)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::new(&s)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

identifier! {
    /// A grammar topic that owns its own progression state.
    TopicId
}

identifier! {
    /// A higher-level content module gated by aggregate stats.
    ModuleId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_casing_and_whitespace_collapse() {
        let a = TopicId::new("Past Tense").unwrap();
        let b = TopicId::new("  past   tense ").unwrap();
        let c = TopicId::new("past-tense").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.as_str(), "past-tense");
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!(TopicId::new("   "), Err(IdError::Empty));
    }

    #[test]
    fn test_rejects_punctuation() {
        assert!(matches!(
            ModuleId::new("module#1"),
            Err(IdError::InvalidChars(_))
        ));
        assert!(ModuleId::new("-leading").is_err());
    }

    #[test]
    fn test_rejects_too_long() {
        let long = "a".repeat(MAX_ID_LEN + 1);
        assert_eq!(TopicId::new(&long), Err(IdError::TooLong(MAX_ID_LEN + 1)));
    }

    #[test]
    fn test_serde_validates_on_deserialize() {
        let id: TopicId = serde_json::from_str("\"Articles\"").unwrap();
        assert_eq!(id.as_str(), "articles");
        assert!(serde_json::from_str::<TopicId>("\"\"").is_err());
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"articles\"");
    }
}
