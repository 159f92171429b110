//! Per-topic mastery, completion flags and level advancement.
//!
//! The tracker owns the in-memory topic map and enforces its invariants:
//! `current_level` only moves forward, a tier is only marked complete once
//! its prerequisite tier is, and mastery stays in `[0, 1]`. Persisting the
//! map is the engine's job.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::TrackerConfig;
use crate::difficulty::Difficulty;
use crate::ident::TopicId;
use crate::progress::{TopicProgress, smooth_mastery};
use crate::scheduler::{QuestionReviewState, ReviewOutcome, review};
use crate::time::UnixSecs;

pub type TopicMap = BTreeMap<TopicId, TopicProgress>;

/// What one `update_topic_progress` call changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelUpdate {
    pub mastery_before: f64,
    pub mastery_after: f64,
    /// Tier whose completion flag flipped on this call.
    pub newly_completed: Option<Difficulty>,
    pub level_before: Difficulty,
    pub level_after: Difficulty,
}

impl LevelUpdate {
    pub fn advanced(&self) -> bool {
        self.level_after > self.level_before
    }
}

pub struct TopicProgressTracker {
    topics: TopicMap,
    config: TrackerConfig,
}

impl TopicProgressTracker {
    pub fn new(config: TrackerConfig, topics: TopicMap) -> Self {
        Self { topics, config }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn topics(&self) -> &TopicMap {
        &self.topics
    }

    pub fn topic_ids(&self) -> impl Iterator<Item = &TopicId> {
        self.topics.keys()
    }

    /// Existing progress, without creating a record.
    pub fn progress(&self, topic: &TopicId) -> Option<&TopicProgress> {
        self.topics.get(topic)
    }

    /// Progress for `topic`, created with defaults on first access.
    pub fn get_progress(&mut self, topic: &TopicId) -> &TopicProgress {
        self.entry(topic)
    }

    fn entry(&mut self, topic: &TopicId) -> &mut TopicProgress {
        self.topics.entry(topic.clone()).or_insert_with(|| {
            tracing::debug!(%topic, "creating topic progress");
            TopicProgress::new(topic.clone())
        })
    }

    /// Schedule the answered question and return its new review state.
    pub fn record_answer(
        &mut self,
        topic: &TopicId,
        question_id: &str,
        difficulty: Difficulty,
        outcome: &ReviewOutcome,
    ) -> QuestionReviewState {
        let progress = self.entry(topic);
        progress.last_played = Some(outcome.reviewed_at);

        let idx = match progress
            .history
            .iter()
            .position(|r| r.question_id == question_id)
        {
            Some(idx) => idx,
            None => {
                progress
                    .history
                    .push(QuestionReviewState::new(question_id, difficulty));
                progress.history.len() - 1
            }
        };

        let mut next = review(&progress.history[idx], outcome);
        next.difficulty = difficulty;
        progress.history[idx] = next.clone();

        tracing::debug!(
            %topic,
            question_id,
            correct = outcome.correct,
            interval_days = next.interval_days,
            ease = next.ease_factor,
            "recorded answer"
        );
        next
    }

    /// Fold a finished run into mastery and, if it was good enough,
    /// complete its tier and advance the level.
    pub fn update_topic_progress(
        &mut self,
        topic: &TopicId,
        difficulty: Difficulty,
        completed: bool,
        accuracy: f64,
        now: UnixSecs,
    ) -> LevelUpdate {
        let TrackerConfig {
            mastery_threshold,
            smoothing_alpha,
        } = self.config;

        let progress = self.entry(topic);
        let mastery_before = progress.mastery_score;
        let level_before = progress.current_level;

        progress.mastery_score = smooth_mastery(mastery_before, accuracy, smoothing_alpha);
        progress.last_played = Some(now);

        let mut newly_completed = None;
        if completed && accuracy >= mastery_threshold {
            let prerequisite_met = difficulty
                .prerequisite()
                .is_none_or(|prev| progress.is_completed(prev));

            if prerequisite_met {
                if !progress.is_completed(difficulty) {
                    progress.mark_completed(difficulty);
                    newly_completed = Some(difficulty);
                }
                if let Some(next) = difficulty.next()
                    && progress.current_level < next
                {
                    progress.current_level = next;
                }
            } else {
                tracing::debug!(
                    %topic,
                    %difficulty,
                    "completion ignored, prerequisite tier not completed"
                );
            }
        }

        LevelUpdate {
            mastery_before,
            mastery_after: progress.mastery_score,
            newly_completed,
            level_before,
            level_after: progress.current_level,
        }
    }

    /// Completion-flag gate. Easy is always open.
    pub fn can_access_level(&self, topic: &TopicId, level: Difficulty) -> bool {
        match level.prerequisite() {
            None => true,
            Some(prev) => self
                .topics
                .get(topic)
                .is_some_and(|p| p.is_completed(prev)),
        }
    }

    pub fn is_topic_mastered(&self, topic: &TopicId) -> bool {
        self.topics.get(topic).is_some_and(TopicProgress::is_mastered)
    }

    /// Fraction of known topics with every tier complete.
    pub fn overall_progress(&self) -> f64 {
        if self.topics.is_empty() {
            return 0.0;
        }
        let mastered = self.topics.values().filter(|p| p.is_mastered()).count();
        mastered as f64 / self.topics.len() as f64
    }

    /// Review states of `topic` that are due at `now`, most overdue first.
    pub fn due_reviews(&self, topic: &TopicId, now: UnixSecs) -> Vec<&QuestionReviewState> {
        let Some(progress) = self.topics.get(topic) else {
            return Vec::new();
        };
        let mut due: Vec<&QuestionReviewState> =
            progress.history.iter().filter(|r| r.is_due(now)).collect();
        due.sort_by_key(|r| std::cmp::Reverse(r.overdue_secs(now)));
        due
    }

    pub(crate) fn replace_all(&mut self, topics: TopicMap) {
        self.topics = topics;
    }
}
