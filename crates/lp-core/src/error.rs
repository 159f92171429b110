use std::fmt;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures the engine reports. Locked tiers, unknown topics and unreadable
/// saved state are not errors; they read as `false` or as defaults.
#[derive(Debug)]
pub enum EngineError {
    /// A save failed. The in-memory state already holds the change.
    Persist(BoxError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Persist(e) => write!(f, "failed to save progress: {e}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Persist(e) => Some(e.as_ref()),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
