/// Ease factor assigned to a question on its first answer.
pub const INITIAL_EASE_FACTOR: f64 = 2.5;

/// Ease factor floor. No answer sequence can push a question below this.
pub const MIN_EASE_FACTOR: f64 = 1.3;

/// Recall quality fed into the SM-2 ease formula for every correct answer.
/// Response time does not grade it: correct answers always move ease by the same delta.
pub const FIXED_RECALL_QUALITY: f64 = 3.0;

/// Ease penalty for an incorrect answer.
pub const LAPSE_EASE_PENALTY: f64 = 0.2;

/// Interval after the first correct answer in a streak.
pub const FIRST_INTERVAL_DAYS: u32 = 1;

/// Interval after the second correct answer in a streak.
pub const SECOND_INTERVAL_DAYS: u32 = 6;

pub const SECS_PER_DAY: u64 = 86_400;

/// Accuracy a completed run must reach to mark a difficulty complete.
pub const DEFAULT_MASTERY_THRESHOLD: f64 = 0.8;

/// Weight of a new accuracy sample in the mastery moving average.
pub const DEFAULT_SMOOTHING_ALPHA: f64 = 0.3;

/// Longest accepted topic or module identifier.
pub const MAX_ID_LEN: usize = 64;

/// Snapshot wire format version.
pub const SNAPSHOT_VERSION: &str = "1";
