use serde::Serialize;

use crate::ident::TopicId;

/// Per-session answer tally. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub correct: u32,
    pub total: u32,
    total_response_time: f64,
}

impl SessionStats {
    pub fn record(&mut self, correct: bool, response_time: f64) {
        self.total += 1;
        if correct {
            self.correct += 1;
        }
        if response_time.is_finite() && response_time > 0.0 {
            self.total_response_time += response_time;
        }
    }

    /// Unlock score: number of correct answers.
    pub fn score(&self) -> u32 {
        self.correct
    }

    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        f64::from(self.correct) / f64::from(self.total)
    }

    /// Mean response time in seconds; infinite for an empty session so that
    /// no speed threshold can pass on zero answers.
    pub fn avg_response_time(&self) -> f64 {
        if self.total == 0 {
            return f64::INFINITY;
        }
        self.total_response_time / f64::from(self.total)
    }
}

/// An open play session on one topic.
#[derive(Debug, Clone)]
pub struct Session {
    pub topic: TopicId,
    pub stats: SessionStats,
}

impl Session {
    pub fn new(topic: TopicId) -> Self {
        Self {
            topic,
            stats: SessionStats::default(),
        }
    }
}
