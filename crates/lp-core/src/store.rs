//! Persistence seam.
//!
//! Three records are kept: topic progress (with review history), the
//! difficulty ledger and the module ledger. Each is loaded and saved on its
//! own. `save_ledgers` writes both ledgers and `save_snapshot` writes all
//! three; implementations that can make those atomic should override them.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::difficulty_unlock::DifficultyLedger;
use crate::module_unlock::ModuleLedger;
use crate::progress::TopicProgress;
use crate::snapshot::ProfileSnapshot;
use crate::tracker::TopicMap;

pub trait ProgressStore {
    type Error: std::error::Error + Send + Sync + 'static;

    fn load_topics(&self) -> Result<TopicMap, Self::Error>;
    fn save_topics(&self, topics: &TopicMap) -> Result<(), Self::Error>;
    /// Write one topic without touching the others.
    fn save_topic(&self, progress: &TopicProgress) -> Result<(), Self::Error>;

    fn load_difficulty_ledger(&self) -> Result<DifficultyLedger, Self::Error>;
    fn save_difficulty_ledger(&self, ledger: &DifficultyLedger) -> Result<(), Self::Error>;

    fn load_module_ledger(&self) -> Result<ModuleLedger, Self::Error>;
    fn save_module_ledger(&self, ledger: &ModuleLedger) -> Result<(), Self::Error>;

    /// Write both ledgers. Topic progress is left alone.
    fn save_ledgers(
        &self,
        difficulty: &DifficultyLedger,
        modules: &ModuleLedger,
    ) -> Result<(), Self::Error> {
        self.save_difficulty_ledger(difficulty)?;
        self.save_module_ledger(modules)
    }

    fn save_snapshot(&self, snapshot: &ProfileSnapshot) -> Result<(), Self::Error> {
        let (topics, difficulty, modules) = snapshot.clone().into_parts();
        self.save_topics(&topics)?;
        self.save_difficulty_ledger(&difficulty)?;
        self.save_module_ledger(&modules)
    }
}

#[derive(Debug)]
pub struct MemoryStoreError(pub &'static str);

impl std::fmt::Display for MemoryStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

impl std::error::Error for MemoryStoreError {}

#[derive(Default)]
struct Records {
    topics: TopicMap,
    difficulty: DifficultyLedger,
    modules: ModuleLedger,
}

/// Process-local store for tests and embedders that persist elsewhere.
/// Loads and saves can be made to fail to exercise degradation paths.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Records>,
    fail_loads: AtomicBool,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    fn read<T>(&self, f: impl FnOnce(&Records) -> T) -> Result<T, MemoryStoreError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(MemoryStoreError("load failed"));
        }
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        Ok(f(&records))
    }

    fn write(&self, f: impl FnOnce(&mut Records)) -> Result<(), MemoryStoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(MemoryStoreError("save failed"));
        }
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut records);
        Ok(())
    }
}

impl ProgressStore for MemoryStore {
    type Error = MemoryStoreError;

    fn load_topics(&self) -> Result<TopicMap, Self::Error> {
        self.read(|r| r.topics.clone())
    }

    fn save_topics(&self, topics: &TopicMap) -> Result<(), Self::Error> {
        self.write(|r| r.topics = topics.clone())
    }

    fn save_topic(&self, progress: &TopicProgress) -> Result<(), Self::Error> {
        self.write(|r| {
            r.topics.insert(progress.topic.clone(), progress.clone());
        })
    }

    fn load_difficulty_ledger(&self) -> Result<DifficultyLedger, Self::Error> {
        self.read(|r| r.difficulty.clone())
    }

    fn save_difficulty_ledger(&self, ledger: &DifficultyLedger) -> Result<(), Self::Error> {
        self.write(|r| r.difficulty = ledger.clone())
    }

    fn load_module_ledger(&self) -> Result<ModuleLedger, Self::Error> {
        self.read(|r| r.modules.clone())
    }

    fn save_module_ledger(&self, ledger: &ModuleLedger) -> Result<(), Self::Error> {
        self.write(|r| r.modules = ledger.clone())
    }
}

/// Shared stores persist through the inner value.
impl<T: ProgressStore + ?Sized> ProgressStore for std::sync::Arc<T> {
    type Error = T::Error;

    fn load_topics(&self) -> Result<TopicMap, Self::Error> {
        (**self).load_topics()
    }

    fn save_topics(&self, topics: &TopicMap) -> Result<(), Self::Error> {
        (**self).save_topics(topics)
    }

    fn save_topic(&self, progress: &TopicProgress) -> Result<(), Self::Error> {
        (**self).save_topic(progress)
    }

    fn load_difficulty_ledger(&self) -> Result<DifficultyLedger, Self::Error> {
        (**self).load_difficulty_ledger()
    }

    fn save_difficulty_ledger(&self, ledger: &DifficultyLedger) -> Result<(), Self::Error> {
        (**self).save_difficulty_ledger(ledger)
    }

    fn load_module_ledger(&self) -> Result<ModuleLedger, Self::Error> {
        (**self).load_module_ledger()
    }

    fn save_module_ledger(&self, ledger: &ModuleLedger) -> Result<(), Self::Error> {
        (**self).save_module_ledger(ledger)
    }

    fn save_ledgers(
        &self,
        difficulty: &DifficultyLedger,
        modules: &ModuleLedger,
    ) -> Result<(), Self::Error> {
        (**self).save_ledgers(difficulty, modules)
    }

    fn save_snapshot(&self, snapshot: &ProfileSnapshot) -> Result<(), Self::Error> {
        (**self).save_snapshot(snapshot)
    }
}
