//! Learning progression engine.
//!
//! Tracks per-topic progress through three difficulty tiers, schedules
//! question reviews with a fixed-quality SM-2 variant, and decides which
//! tiers and content modules a learner may play. Two independent unlock
//! mechanisms exist: completion flags driven by smoothed mastery, and a
//! score/speed ledger. A startup policy can open or close everything.
//!
//! Zero I/O. Persistence goes through the [`ProgressStore`] trait.

pub mod config;
pub mod constants;
pub mod difficulty;
pub mod difficulty_unlock;
pub mod engine;
pub mod error;
pub mod gating;
pub mod ident;
pub mod module_unlock;
pub mod policy;
pub mod progress;
pub mod scheduler;
pub mod session;
pub mod shared;
pub mod snapshot;
pub mod store;
pub mod time;
pub mod tracker;

pub use config::{DifficultyThresholds, EngineConfig, ModuleConfig, ModuleDef, TrackerConfig};
pub use constants::{
    DEFAULT_MASTERY_THRESHOLD, DEFAULT_SMOOTHING_ALPHA, INITIAL_EASE_FACTOR, MIN_EASE_FACTOR,
    SNAPSHOT_VERSION,
};
pub use difficulty::{Difficulty, ParseDifficultyError};
pub use difficulty_unlock::{DifficultyLedger, DifficultyUnlockEvaluator};
pub use engine::{ProgressionEngine, SessionSummary};
pub use error::{EngineError, Result};
pub use gating::{AccessGate, GateInputs, GateMode};
pub use ident::{IdError, ModuleId, TopicId};
pub use module_unlock::{
    DerivedStats, ModuleEvaluation, ModuleLedger, ModuleUnlockEvaluator, StaticStats,
    StatsProvider,
};
pub use policy::{LedgerReset, LedgerStrategy, UnlockPolicy};
pub use progress::{ProgressSummary, TopicProgress, smooth_mastery};
pub use scheduler::{QuestionReviewState, ReviewOutcome, review, schedule};
pub use session::SessionStats;
pub use shared::SharedEngine;
pub use snapshot::{ProfileSnapshot, export_json, import_json};
pub use store::{MemoryStore, ProgressStore};
pub use time::{UnixSecs, format_iso8601, now_unix_secs};
pub use tracker::{LevelUpdate, TopicMap, TopicProgressTracker};
