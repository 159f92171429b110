//! Engine tuning knobs. Every field has a default, so a partial config file
//! (or none at all) is always usable.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_MASTERY_THRESHOLD, DEFAULT_SMOOTHING_ALPHA};
use crate::gating::GateMode;
use crate::ident::{ModuleId, TopicId};
use crate::policy::UnlockPolicy;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tracker: TrackerConfig,
    pub difficulty: DifficultyThresholds,
    pub modules: ModuleConfig,
    pub policy: UnlockPolicy,
    pub gate: GateMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Accuracy a completed run needs to mark its difficulty complete.
    pub mastery_threshold: f64,
    /// Weight of each new accuracy sample in the mastery score.
    pub smoothing_alpha: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            mastery_threshold: DEFAULT_MASTERY_THRESHOLD,
            smoothing_alpha: DEFAULT_SMOOTHING_ALPHA,
        }
    }
}

/// Score/speed thresholds for the difficulty ledger. A threshold of zero
/// (or a non-finite speed) leaves that tier unreachable by evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DifficultyThresholds {
    pub unlock_medium_score: u32,
    /// Max average response time, seconds.
    pub medium_speed_threshold: f64,
    pub unlock_hard_score: u32,
    pub hard_speed_threshold: f64,
}

impl Default for DifficultyThresholds {
    fn default() -> Self {
        Self {
            unlock_medium_score: 5,
            medium_speed_threshold: 6.0,
            unlock_hard_score: 8,
            hard_speed_threshold: 4.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    /// Overall accuracy needed before any module is considered.
    pub accuracy_threshold: f64,
    /// Learner level needed before any module is considered.
    pub level_threshold: u32,
    /// Per-module mastery needed to unlock that module.
    pub mastery_threshold: f64,
    /// Modules in display order. Order implies no prerequisite.
    pub modules: Vec<ModuleDef>,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            accuracy_threshold: 0.7,
            level_threshold: 3,
            mastery_threshold: 0.8,
            modules: Vec::new(),
        }
    }
}

impl ModuleConfig {
    pub fn module_ids(&self) -> Vec<ModuleId> {
        self.modules.iter().map(|m| m.id.clone()).collect()
    }
}

/// A content module and the topics whose mastery it aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDef {
    pub id: ModuleId,
    #[serde(default)]
    pub topics: Vec<TopicId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.tracker.mastery_threshold, 0.8);
        assert_eq!(config.difficulty.unlock_medium_score, 5);
        assert_eq!(config.policy, UnlockPolicy::Normal);
        assert!(config.modules.modules.is_empty());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"difficulty": {"unlock_hard_score": 10}}"#).unwrap();
        assert_eq!(config.difficulty.unlock_hard_score, 10);
        assert_eq!(config.difficulty.unlock_medium_score, 5);
        assert_eq!(config.tracker.smoothing_alpha, 0.3);
    }

    #[test]
    fn test_module_defs_validate_ids() {
        let bad = serde_json::from_str::<ModuleConfig>(r#"{"modules": [{"id": "bad id!"}]}"#);
        assert!(bad.is_err());
    }
}
