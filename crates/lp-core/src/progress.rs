use serde::{Deserialize, Serialize};

use crate::constants::MIN_EASE_FACTOR;
use crate::difficulty::Difficulty;
use crate::ident::TopicId;
use crate::scheduler::{QuestionReviewState, clean_response_time};
use crate::time::UnixSecs;

/// Progression state of one topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicProgress {
    pub topic: TopicId,
    pub current_level: Difficulty,
    pub is_easy_completed: bool,
    pub is_medium_completed: bool,
    pub is_hard_completed: bool,
    pub mastery_score: f64,
    #[serde(default)]
    pub last_played: Option<UnixSecs>,
    /// Review state per question, in order of first answer.
    #[serde(default)]
    pub history: Vec<QuestionReviewState>,
}

impl TopicProgress {
    pub fn new(topic: TopicId) -> Self {
        Self {
            topic,
            current_level: Difficulty::Easy,
            is_easy_completed: false,
            is_medium_completed: false,
            is_hard_completed: false,
            mastery_score: 0.0,
            last_played: None,
            history: Vec::new(),
        }
    }

    pub fn is_completed(&self, difficulty: Difficulty) -> bool {
        match difficulty {
            Difficulty::Easy => self.is_easy_completed,
            Difficulty::Medium => self.is_medium_completed,
            Difficulty::Hard => self.is_hard_completed,
        }
    }

    pub(crate) fn mark_completed(&mut self, difficulty: Difficulty) {
        match difficulty {
            Difficulty::Easy => self.is_easy_completed = true,
            Difficulty::Medium => self.is_medium_completed = true,
            Difficulty::Hard => self.is_hard_completed = true,
        }
    }

    pub fn is_mastered(&self) -> bool {
        self.is_easy_completed && self.is_medium_completed && self.is_hard_completed
    }

    /// Number of completed tiers, 0..=3.
    pub fn completed_tiers(&self) -> u32 {
        Difficulty::ALL
            .iter()
            .filter(|d| self.is_completed(**d))
            .count() as u32
    }

    /// Restore invariants on state read from outside the engine: mastery in
    /// `[0, 1]`, no tier complete without its prerequisite, level at least
    /// one past the highest completed tier, ease and interval at their floors.
    /// Returns true if anything changed.
    pub fn repair(&mut self) -> bool {
        let before = self.clone();

        self.mastery_score = sanitize_unit(self.mastery_score);
        if !self.is_easy_completed {
            self.is_medium_completed = false;
        }
        if !self.is_medium_completed {
            self.is_hard_completed = false;
        }
        for d in Difficulty::ALL {
            if self.is_completed(d)
                && let Some(next) = d.next()
                && self.current_level < next
            {
                self.current_level = next;
            }
        }
        for r in &mut self.history {
            if r.ease_factor.is_nan() || r.ease_factor < MIN_EASE_FACTOR {
                r.ease_factor = MIN_EASE_FACTOR;
            }
            r.interval_days = r.interval_days.max(1);
            r.last_response_time = clean_response_time(r.last_response_time);
        }

        *self != before
    }

    pub fn review(&self, question_id: &str) -> Option<&QuestionReviewState> {
        self.history.iter().find(|r| r.question_id == question_id)
    }

    /// Outward-facing summary, without review history.
    pub fn summary(&self) -> ProgressSummary {
        ProgressSummary {
            topic: self.topic.clone(),
            current_level: self.current_level,
            is_easy_completed: self.is_easy_completed,
            is_medium_completed: self.is_medium_completed,
            is_hard_completed: self.is_hard_completed,
            mastery_score: self.mastery_score,
        }
    }
}

/// What UI surfaces read back for a topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub topic: TopicId,
    pub current_level: Difficulty,
    pub is_easy_completed: bool,
    pub is_medium_completed: bool,
    pub is_hard_completed: bool,
    pub mastery_score: f64,
}

/// Exponential smoothing of mastery toward an accuracy sample.
/// Both inputs are clamped to `[0, 1]`, so the result is too.
pub fn smooth_mastery(old: f64, sample: f64, alpha: f64) -> f64 {
    let old = sanitize_unit(old);
    let sample = sanitize_unit(sample);
    let alpha = sanitize_unit(alpha);
    (old + (sample - old) * alpha).clamp(0.0, 1.0)
}

fn sanitize_unit(x: f64) -> f64 {
    if x.is_nan() { 0.0 } else { x.clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn topic() -> TopicId {
        TopicId::new("articles").unwrap()
    }

    #[test]
    fn test_new_defaults() {
        let p = TopicProgress::new(topic());
        assert_eq!(p.current_level, Difficulty::Easy);
        assert!(!p.is_easy_completed && !p.is_medium_completed && !p.is_hard_completed);
        assert_eq!(p.mastery_score, 0.0);
        assert!(p.history.is_empty());
        assert_eq!(p.completed_tiers(), 0);
    }

    #[test]
    fn test_smoothing_is_lerp() {
        assert_relative_eq!(smooth_mastery(0.0, 1.0, 0.3), 0.3);
        assert_relative_eq!(smooth_mastery(0.5, 0.5, 0.3), 0.5);
        assert_relative_eq!(smooth_mastery(1.0, 0.0, 0.25), 0.75);
    }

    #[test]
    fn test_smoothing_stays_in_unit_interval() {
        assert_eq!(smooth_mastery(0.9, 7.0, 1.0), 1.0);
        assert_eq!(smooth_mastery(0.1, -3.0, 1.0), 0.0);
        assert_eq!(smooth_mastery(0.4, f64::NAN, 0.5), 0.2);
    }

    #[test]
    fn test_repair_restores_invariants() {
        let mut p = TopicProgress::new(topic());
        p.mastery_score = 1.7;
        p.is_medium_completed = true;
        p.history.push(QuestionReviewState::new("q", Difficulty::Easy));
        p.history[0].ease_factor = 0.4;
        p.history[0].interval_days = 0;

        assert!(p.repair());
        assert_eq!(p.mastery_score, 1.0);
        assert!(!p.is_medium_completed);
        assert_eq!(p.history[0].ease_factor, MIN_EASE_FACTOR);
        assert_eq!(p.history[0].interval_days, 1);
        assert!(!p.repair());
    }

    #[test]
    fn test_repair_lifts_level_to_match_flags() {
        let mut p = TopicProgress::new(topic());
        p.is_easy_completed = true;
        assert!(p.repair());
        assert_eq!(p.current_level, Difficulty::Medium);
    }

    #[test]
    fn test_wire_names_are_camel_case() {
        let json = serde_json::to_value(TopicProgress::new(topic()).summary()).unwrap();
        assert_eq!(json["currentLevel"], "easy");
        assert_eq!(json["isEasyCompleted"], false);
        assert_eq!(json["masteryScore"], 0.0);
    }
}
