//! One access question, several answers.
//!
//! Completion flags ([`MasteryGate`]) and the score/speed ledger
//! ([`ThresholdGate`]) are two independent ways a tier can open. The engine
//! asks a single [`AccessGate`] built from [`GateMode`] at startup, so
//! callers never need to know which mechanism, or which mix, is in force.

use serde::{Deserialize, Serialize};

use crate::difficulty::Difficulty;
use crate::difficulty_unlock::DifficultyUnlockEvaluator;
use crate::ident::TopicId;
use crate::tracker::TopicProgressTracker;

/// Which mechanisms decide whether a tier is playable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GateMode {
    /// Completion flags only.
    Mastery,
    /// Unlock ledger only.
    Threshold,
    /// Open if either mechanism opens it.
    #[default]
    Either,
    /// Open only if both mechanisms open it.
    Both,
}

impl GateMode {
    pub fn build(self) -> Box<dyn AccessGate> {
        match self {
            GateMode::Mastery => Box::new(MasteryGate),
            GateMode::Threshold => Box::new(ThresholdGate),
            GateMode::Either => Box::new(AnyGate(vec![Box::new(MasteryGate), Box::new(ThresholdGate)])),
            GateMode::Both => Box::new(AllGate(vec![Box::new(MasteryGate), Box::new(ThresholdGate)])),
        }
    }
}

/// State a gate may consult.
pub struct GateInputs<'a> {
    pub tracker: &'a TopicProgressTracker,
    pub ledger: &'a DifficultyUnlockEvaluator,
}

pub trait AccessGate: Send + Sync {
    fn name(&self) -> &'static str;
    fn allows(&self, inputs: &GateInputs<'_>, topic: &TopicId, level: Difficulty) -> bool;
}

pub struct MasteryGate;

impl AccessGate for MasteryGate {
    fn name(&self) -> &'static str {
        "mastery"
    }

    fn allows(&self, inputs: &GateInputs<'_>, topic: &TopicId, level: Difficulty) -> bool {
        inputs.tracker.can_access_level(topic, level)
    }
}

pub struct ThresholdGate;

impl AccessGate for ThresholdGate {
    fn name(&self) -> &'static str {
        "threshold"
    }

    fn allows(&self, inputs: &GateInputs<'_>, topic: &TopicId, level: Difficulty) -> bool {
        inputs.ledger.is_unlocked(topic, level)
    }
}

pub struct AnyGate(pub Vec<Box<dyn AccessGate>>);

impl AccessGate for AnyGate {
    fn name(&self) -> &'static str {
        "any"
    }

    fn allows(&self, inputs: &GateInputs<'_>, topic: &TopicId, level: Difficulty) -> bool {
        self.0.iter().any(|g| g.allows(inputs, topic, level))
    }
}

pub struct AllGate(pub Vec<Box<dyn AccessGate>>);

impl AccessGate for AllGate {
    fn name(&self) -> &'static str {
        "all"
    }

    fn allows(&self, inputs: &GateInputs<'_>, topic: &TopicId, level: Difficulty) -> bool {
        !self.0.is_empty() && self.0.iter().all(|g| g.allows(inputs, topic, level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DifficultyThresholds, TrackerConfig};
    use crate::difficulty_unlock::DifficultyLedger;
    use crate::tracker::TopicMap;

    struct Fixture {
        tracker: TopicProgressTracker,
        ledger: DifficultyUnlockEvaluator,
        topic: TopicId,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                tracker: TopicProgressTracker::new(TrackerConfig::default(), TopicMap::new()),
                ledger: DifficultyUnlockEvaluator::new(
                    DifficultyThresholds::default(),
                    DifficultyLedger::new(),
                ),
                topic: TopicId::new("tenses").unwrap(),
            }
        }

        fn allows(&self, mode: GateMode, level: Difficulty) -> bool {
            let inputs = GateInputs {
                tracker: &self.tracker,
                ledger: &self.ledger,
            };
            mode.build().allows(&inputs, &self.topic, level)
        }
    }

    #[test]
    fn test_easy_open_under_every_mode() {
        let f = Fixture::new();
        for mode in [GateMode::Mastery, GateMode::Threshold, GateMode::Either, GateMode::Both] {
            assert!(f.allows(mode, Difficulty::Easy), "{mode:?}");
        }
    }

    #[test]
    fn test_ledger_only_unlock() {
        let mut f = Fixture::new();
        let topic = f.topic.clone();
        f.ledger.evaluate_unlocks(&topic, 6, 3.0);

        assert!(!f.allows(GateMode::Mastery, Difficulty::Medium));
        assert!(f.allows(GateMode::Threshold, Difficulty::Medium));
        assert!(f.allows(GateMode::Either, Difficulty::Medium));
        assert!(!f.allows(GateMode::Both, Difficulty::Medium));
    }

    #[test]
    fn test_both_mechanisms_agree() {
        let mut f = Fixture::new();
        let topic = f.topic.clone();
        f.ledger.evaluate_unlocks(&topic, 6, 3.0);
        f.tracker
            .update_topic_progress(&topic, Difficulty::Easy, true, 0.9, 0);
        assert!(f.allows(GateMode::Both, Difficulty::Medium));
        assert!(!f.allows(GateMode::Both, Difficulty::Hard));
    }

    #[test]
    fn test_empty_all_gate_is_closed() {
        let f = Fixture::new();
        let inputs = GateInputs {
            tracker: &f.tracker,
            ledger: &f.ledger,
        };
        assert!(!AllGate(Vec::new()).allows(&inputs, &f.topic, Difficulty::Easy));
    }

    #[test]
    fn test_mode_names_in_config() {
        let mode: GateMode = serde_json::from_str("\"threshold\"").unwrap();
        assert_eq!(mode, GateMode::Threshold);
        assert_eq!(mode.build().name(), "threshold");
    }
}
