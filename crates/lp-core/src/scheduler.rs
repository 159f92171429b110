//! SM-2 style spaced repetition for individual questions.
//!
//! Intervals follow SuperMemo 2 (1 day, 6 days, then `interval * ease`), but
//! the ease adjustment on a correct answer is not graded by recall quality.
//! Every correct answer is scored at [`FIXED_RECALL_QUALITY`], so ease moves by
//! the same delta no matter how quickly the learner answered. An incorrect
//! answer resets the streak and costs [`LAPSE_EASE_PENALTY`].

use serde::{Deserialize, Serialize};

use crate::constants::{
    FIRST_INTERVAL_DAYS, FIXED_RECALL_QUALITY, INITIAL_EASE_FACTOR, LAPSE_EASE_PENALTY,
    MIN_EASE_FACTOR, SECOND_INTERVAL_DAYS,
};
use crate::difficulty::Difficulty;
use crate::time::{UnixSecs, after_days};

/// Review state of one question, created on its first answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionReviewState {
    pub question_id: String,
    pub difficulty: Difficulty,
    pub last_correct: bool,
    /// Seconds the learner took on the most recent answer.
    pub last_response_time: f64,
    /// Tries the learner needed on the most recent answer.
    #[serde(default = "one")]
    pub attempts: u32,
    pub repetitions: u32,
    pub ease_factor: f64,
    pub interval_days: u32,
    pub last_reviewed: UnixSecs,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default)]
    pub lapses: u32,
}

fn one() -> u32 {
    1
}

impl QuestionReviewState {
    pub fn new(question_id: &str, difficulty: Difficulty) -> Self {
        Self {
            question_id: question_id.to_string(),
            difficulty,
            last_correct: false,
            last_response_time: 0.0,
            attempts: 1,
            repetitions: 0,
            ease_factor: INITIAL_EASE_FACTOR,
            interval_days: FIRST_INTERVAL_DAYS,
            last_reviewed: 0,
            review_count: 0,
            lapses: 0,
        }
    }

    /// When this question is next due for review.
    pub fn due_at(&self) -> UnixSecs {
        after_days(self.last_reviewed, self.interval_days)
    }

    pub fn is_due(&self, now: UnixSecs) -> bool {
        now >= self.due_at()
    }

    /// Seconds past the due time, zero if not yet due.
    pub fn overdue_secs(&self, now: UnixSecs) -> u64 {
        now.saturating_sub(self.due_at())
    }
}

/// One answer to a question, as reported by the quiz surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewOutcome {
    pub correct: bool,
    pub response_time: f64,
    pub attempts: u32,
    pub reviewed_at: UnixSecs,
}

/// SM-2 ease adjustment for a recall quality in `0..=5`.
/// EF' = EF + (0.1 - (5 - q) * (0.08 + (5 - q) * 0.02))
pub fn ease_delta(quality: f64) -> f64 {
    let miss = 5.0 - quality;
    0.1 - miss * (0.08 + miss * 0.02)
}

/// Interval and ease update for one answer. Pure; bookkeeping fields are
/// left untouched.
pub fn schedule(state: &QuestionReviewState, correct: bool) -> QuestionReviewState {
    let mut next = state.clone();

    if correct {
        next.interval_days = match state.repetitions {
            0 => FIRST_INTERVAL_DAYS,
            1 => SECOND_INTERVAL_DAYS,
            _ => (f64::from(state.interval_days) * state.ease_factor).round() as u32,
        };
        next.repetitions = state.repetitions + 1;
        next.ease_factor = (state.ease_factor + ease_delta(FIXED_RECALL_QUALITY)).max(MIN_EASE_FACTOR);
    } else {
        next.repetitions = 0;
        next.interval_days = FIRST_INTERVAL_DAYS;
        next.ease_factor = (state.ease_factor - LAPSE_EASE_PENALTY).max(MIN_EASE_FACTOR);
    }

    next.interval_days = next.interval_days.max(FIRST_INTERVAL_DAYS);
    next
}

/// Response times that are not a finite, non-negative number of seconds
/// are stored as zero.
pub fn clean_response_time(secs: f64) -> f64 {
    if secs.is_finite() && secs >= 0.0 { secs } else { 0.0 }
}

/// Apply an answer: reschedule, then record what the learner did.
pub fn review(state: &QuestionReviewState, outcome: &ReviewOutcome) -> QuestionReviewState {
    let mut next = schedule(state, outcome.correct);
    next.last_correct = outcome.correct;
    next.last_response_time = clean_response_time(outcome.response_time);
    next.attempts = outcome.attempts.max(1);
    next.last_reviewed = outcome.reviewed_at;
    next.review_count = state.review_count.saturating_add(1);
    if !outcome.correct {
        next.lapses = state.lapses.saturating_add(1);
    }
    next
}
