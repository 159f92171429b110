//! Score/speed ledger of unlocked difficulty tiers.
//!
//! This ledger is separate from the tracker's completion flags: a learner
//! can reach Hard here by answering quickly and well in one session without
//! having completed Medium, and vice versa. The engine exposes both, plus a
//! combined gate (see [`crate::gating`]).

use std::collections::{BTreeMap, BTreeSet};

use crate::config::DifficultyThresholds;
use crate::difficulty::Difficulty;
use crate::ident::TopicId;

pub type DifficultyLedger = BTreeMap<TopicId, BTreeSet<Difficulty>>;

pub struct DifficultyUnlockEvaluator {
    ledger: DifficultyLedger,
    thresholds: DifficultyThresholds,
    open_all: bool,
}

fn passes(score: u32, avg_response_time: f64, min_score: u32, max_time: f64) -> bool {
    let configured = min_score > 0 && max_time.is_finite() && max_time > 0.0;
    configured && score >= min_score && avg_response_time <= max_time
}

impl DifficultyUnlockEvaluator {
    pub fn new(thresholds: DifficultyThresholds, ledger: DifficultyLedger) -> Self {
        Self {
            ledger,
            thresholds,
            open_all: false,
        }
    }

    pub fn set_open_all(&mut self, open_all: bool) {
        self.open_all = open_all;
    }

    pub fn thresholds(&self) -> &DifficultyThresholds {
        &self.thresholds
    }

    pub fn ledger(&self) -> &DifficultyLedger {
        &self.ledger
    }

    /// Add every tier the session earned. Returns tiers that were not
    /// already in the ledger. Never removes anything.
    pub fn evaluate_unlocks(
        &mut self,
        topic: &TopicId,
        score: u32,
        avg_response_time: f64,
    ) -> Vec<Difficulty> {
        let t = &self.thresholds;
        let mut earned = vec![Difficulty::Easy];
        if passes(
            score,
            avg_response_time,
            t.unlock_medium_score,
            t.medium_speed_threshold,
        ) {
            earned.push(Difficulty::Medium);
        }
        if passes(
            score,
            avg_response_time,
            t.unlock_hard_score,
            t.hard_speed_threshold,
        ) {
            earned.push(Difficulty::Hard);
        }

        let unlocked = self.ledger.entry(topic.clone()).or_default();
        let newly: Vec<Difficulty> = earned
            .into_iter()
            .filter(|d| unlocked.insert(*d))
            .collect();

        tracing::debug!(
            %topic,
            score,
            avg_response_time,
            newly = ?newly,
            "evaluated difficulty unlocks"
        );
        newly
    }

    /// Ledger gate. Easy is implicitly unlocked for every topic.
    pub fn is_unlocked(&self, topic: &TopicId, level: Difficulty) -> bool {
        level == Difficulty::Easy
            || self.open_all
            || self.ledger.get(topic).is_some_and(|set| set.contains(&level))
    }

    /// All tiers readable as unlocked for `topic`, Easy included.
    pub fn unlocked(&self, topic: &TopicId) -> BTreeSet<Difficulty> {
        Difficulty::ALL
            .into_iter()
            .filter(|d| self.is_unlocked(topic, *d))
            .collect()
    }

    pub fn unlock_all<'a>(&mut self, topics: impl IntoIterator<Item = &'a TopicId>) {
        for topic in topics {
            self.ledger
                .entry(topic.clone())
                .or_default()
                .extend(Difficulty::ALL);
        }
    }

    /// Administrative reset; the only way entries leave the ledger.
    pub fn lock_all(&mut self) {
        self.ledger.clear();
    }

    pub(crate) fn replace_ledger(&mut self, ledger: DifficultyLedger) {
        self.ledger = ledger;
    }
}
