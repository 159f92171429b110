//! Startup unlock policy for debugging and content review.
//!
//! The policy is chosen once (config or `--policy`) and resolved into a
//! [`LedgerStrategy`] before the engine loads its ledgers. Nothing else in the
//! engine branches on the policy name.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnlockPolicy {
    /// Use the persisted ledgers as they are.
    #[default]
    Normal,
    /// Everything reads as unlocked for this run; the stored ledgers are untouched.
    UnlockAll,
    /// Ledgers start empty for this run and nothing is written back.
    LockAll,
    /// Fill and save the ledgers for every known topic and module.
    UnlockAllPersist,
    /// Clear and save the ledgers.
    LockAllPersist,
}

impl UnlockPolicy {
    pub const ALL: [UnlockPolicy; 5] = [
        UnlockPolicy::Normal,
        UnlockPolicy::UnlockAll,
        UnlockPolicy::LockAll,
        UnlockPolicy::UnlockAllPersist,
        UnlockPolicy::LockAllPersist,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            UnlockPolicy::Normal => "normal",
            UnlockPolicy::UnlockAll => "unlock-all",
            UnlockPolicy::LockAll => "lock-all",
            UnlockPolicy::UnlockAllPersist => "unlock-all-persist",
            UnlockPolicy::LockAllPersist => "lock-all-persist",
        }
    }

    pub fn resolve(self) -> LedgerStrategy {
        match self {
            UnlockPolicy::Normal => LedgerStrategy {
                open_all: false,
                reset: None,
                write_through: true,
            },
            UnlockPolicy::UnlockAll => LedgerStrategy {
                open_all: true,
                reset: None,
                write_through: true,
            },
            UnlockPolicy::LockAll => LedgerStrategy {
                open_all: false,
                reset: Some(LedgerReset::Clear),
                write_through: false,
            },
            UnlockPolicy::UnlockAllPersist => LedgerStrategy {
                open_all: true,
                reset: Some(LedgerReset::Fill),
                write_through: true,
            },
            UnlockPolicy::LockAllPersist => LedgerStrategy {
                open_all: false,
                reset: Some(LedgerReset::Clear),
                write_through: true,
            },
        }
    }
}

impl fmt::Display for UnlockPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnlockPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        UnlockPolicy::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| format!("unknown unlock policy '{s}'"))
    }
}

/// How loaded ledgers are replaced at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerReset {
    Fill,
    Clear,
}

/// Concrete ledger behaviour for one engine run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerStrategy {
    /// Every topic difficulty and module reads as unlocked, known or not.
    pub open_all: bool,
    /// Replace the loaded ledgers before first use.
    pub reset: Option<LedgerReset>,
    /// Ledger changes are saved. Off only for transient lock-all.
    pub write_through: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_both_separators() {
        assert_eq!(
            "unlock_all_persist".parse::<UnlockPolicy>(),
            Ok(UnlockPolicy::UnlockAllPersist)
        );
        assert_eq!("LOCK-ALL".parse::<UnlockPolicy>(), Ok(UnlockPolicy::LockAll));
        assert!("sometimes".parse::<UnlockPolicy>().is_err());
    }

    #[test]
    fn test_transient_lock_does_not_write() {
        let strategy = UnlockPolicy::LockAll.resolve();
        assert_eq!(strategy.reset, Some(LedgerReset::Clear));
        assert!(!strategy.write_through);
    }

    #[test]
    fn test_transient_unlock_keeps_ledger() {
        let strategy = UnlockPolicy::UnlockAll.resolve();
        assert!(strategy.open_all);
        assert_eq!(strategy.reset, None);
    }

    #[test]
    fn test_normal_is_identity() {
        let strategy = UnlockPolicy::Normal.resolve();
        assert!(!strategy.open_all);
        assert_eq!(strategy.reset, None);
        assert!(strategy.write_through);
    }
}
