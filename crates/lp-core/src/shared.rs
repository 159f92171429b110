//! Cloneable handle for engines used from several threads.

use std::sync::{Arc, Mutex};

use crate::engine::ProgressionEngine;
use crate::store::ProgressStore;

/// All clones see the same engine. Calls are serialized; a call that
/// panicked leaves the engine as it was after its last completed save.
pub struct SharedEngine<S: ProgressStore> {
    inner: Arc<Mutex<ProgressionEngine<S>>>,
}

impl<S: ProgressStore> Clone for SharedEngine<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: ProgressStore> SharedEngine<S> {
    pub fn new(engine: ProgressionEngine<S>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Run `f` with exclusive access to the engine.
    pub fn with<R>(&self, f: impl FnOnce(&mut ProgressionEngine<S>) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("engine lock poisoned, continuing with last state");
            poisoned.into_inner()
        });
        f(&mut guard)
    }
}
