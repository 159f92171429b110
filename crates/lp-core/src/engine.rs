//! The progression engine: one handle over scheduler, tracker, both unlock
//! evaluators and the store.
//!
//! Construct it once at startup and pass it to every surface that needs it.
//! Every mutating call saves what it changed before returning, so any read
//! that follows (from any caller holding the handle) sees the change.

use serde::Serialize;

use crate::config::EngineConfig;
use crate::difficulty::Difficulty;
use crate::difficulty_unlock::{DifficultyLedger, DifficultyUnlockEvaluator};
use crate::error::{EngineError, Result};
use crate::gating::{AccessGate, GateInputs};
use crate::ident::{ModuleId, TopicId};
use crate::module_unlock::{
    DerivedStats, ModuleEvaluation, ModuleLedger, ModuleUnlockEvaluator, StatsProvider,
};
use crate::policy::{LedgerReset, LedgerStrategy, UnlockPolicy};
use crate::progress::{ProgressSummary, TopicProgress};
use crate::scheduler::{QuestionReviewState, ReviewOutcome};
use crate::session::{Session, SessionStats};
use crate::snapshot::ProfileSnapshot;
use crate::store::ProgressStore;
use crate::time::{UnixSecs, now_unix_secs};
use crate::tracker::{LevelUpdate, TopicMap, TopicProgressTracker};

type Clock = Box<dyn Fn() -> UnixSecs + Send + Sync>;

/// Result of closing a play session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub topic: TopicId,
    pub stats: SessionStats,
    pub newly_unlocked: Vec<Difficulty>,
}

pub struct ProgressionEngine<S: ProgressStore> {
    store: S,
    tracker: TopicProgressTracker,
    difficulty: DifficultyUnlockEvaluator,
    modules: ModuleUnlockEvaluator,
    gate: Box<dyn AccessGate>,
    policy: UnlockPolicy,
    strategy: LedgerStrategy,
    session: Option<Session>,
    clock: Clock,
}

fn load_or_default<T: Default, E: std::fmt::Display>(
    what: &str,
    loaded: std::result::Result<T, E>,
) -> T {
    loaded.unwrap_or_else(|e| {
        tracing::warn!("could not load {what}, starting empty: {e}");
        T::default()
    })
}

fn persist<E: std::error::Error + Send + Sync + 'static>(
    result: std::result::Result<(), E>,
) -> Result<()> {
    result.map_err(|e| EngineError::Persist(Box::new(e)))
}

impl<S: ProgressStore> ProgressionEngine<S> {
    /// Load all records and apply the startup policy. Never fails: records
    /// that cannot be read start empty.
    pub fn open(store: S, config: EngineConfig) -> Self {
        let mut topics: TopicMap = load_or_default("topic progress", store.load_topics());
        for progress in topics.values_mut() {
            if progress.repair() {
                tracing::warn!(topic = %progress.topic, "repaired stored topic progress");
            }
        }
        let difficulty_ledger: DifficultyLedger =
            load_or_default("difficulty ledger", store.load_difficulty_ledger());
        let module_ledger: ModuleLedger =
            load_or_default("module ledger", store.load_module_ledger());

        let strategy = config.policy.resolve();
        let mut engine = Self {
            store,
            tracker: TopicProgressTracker::new(config.tracker, topics),
            difficulty: DifficultyUnlockEvaluator::new(config.difficulty, difficulty_ledger),
            modules: ModuleUnlockEvaluator::new(config.modules, module_ledger),
            gate: config.gate.build(),
            policy: config.policy,
            strategy,
            session: None,
            clock: Box::new(now_unix_secs),
        };

        engine.difficulty.set_open_all(strategy.open_all);
        engine.modules.set_open_all(strategy.open_all);
        if let Some(reset) = strategy.reset {
            engine.reset_ledgers(reset);
            if let Err(e) = engine.persist_ledgers() {
                tracing::warn!("could not save ledgers after {} startup: {e}", config.policy);
            }
        }

        tracing::info!(
            topics = engine.tracker.topics().len(),
            policy = %engine.policy,
            gate = engine.gate.name(),
            "progression engine ready"
        );
        engine
    }

    /// Replace the wall clock, for deterministic callers.
    pub fn with_clock(mut self, clock: impl Fn() -> UnixSecs + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn now(&self) -> UnixSecs {
        (self.clock)()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> UnlockPolicy {
        self.policy
    }

    fn reset_ledgers(&mut self, reset: LedgerReset) {
        match reset {
            LedgerReset::Fill => {
                self.difficulty.unlock_all(self.tracker.topic_ids());
                self.modules.unlock_all();
            }
            LedgerReset::Clear => {
                self.difficulty.lock_all();
                self.modules.lock_all();
            }
        }
    }

    fn persist_topic(&self, topic: &TopicId) -> Result<()> {
        match self.tracker.progress(topic) {
            Some(progress) => persist(self.store.save_topic(progress)),
            None => Ok(()),
        }
    }

    fn persist_difficulty_ledger(&self) -> Result<()> {
        if !self.strategy.write_through {
            return Ok(());
        }
        persist(self.store.save_difficulty_ledger(self.difficulty.ledger()))
    }

    fn persist_module_ledger(&self) -> Result<()> {
        if !self.strategy.write_through {
            return Ok(());
        }
        persist(self.store.save_module_ledger(self.modules.ledger()))
    }

    fn persist_ledgers(&self) -> Result<()> {
        if !self.strategy.write_through {
            return Ok(());
        }
        persist(
            self.store
                .save_ledgers(self.difficulty.ledger(), self.modules.ledger()),
        )
    }

    /// Save everything in one go, atomically where the store supports it.
    fn persist_all(&self) -> Result<()> {
        if self.strategy.write_through {
            persist(self.store.save_snapshot(&self.snapshot()))
        } else {
            persist(self.store.save_topics(self.tracker.topics()))
        }
    }

    // --- Inbound ---

    /// Schedule the answered question, count it toward an open session on
    /// the same topic, and save the topic.
    pub fn record_answer(
        &mut self,
        topic: &TopicId,
        question_id: &str,
        difficulty: Difficulty,
        correct: bool,
        response_time: f64,
        attempts: u32,
    ) -> Result<QuestionReviewState> {
        let outcome = ReviewOutcome {
            correct,
            response_time,
            attempts,
            reviewed_at: self.now(),
        };
        let state = self
            .tracker
            .record_answer(topic, question_id, difficulty, &outcome);

        if let Some(session) = self.session.as_mut()
            && &session.topic == topic
        {
            session.stats.record(correct, response_time);
        }

        self.persist_topic(topic)?;
        Ok(state)
    }

    pub fn update_topic_progress(
        &mut self,
        topic: &TopicId,
        difficulty: Difficulty,
        completed: bool,
        accuracy: f64,
    ) -> Result<LevelUpdate> {
        let now = self.now();
        let update = self
            .tracker
            .update_topic_progress(topic, difficulty, completed, accuracy, now);
        if update.advanced() {
            tracing::info!(
                %topic,
                from = %update.level_before,
                to = %update.level_after,
                "topic level advanced"
            );
        }
        self.persist_topic(topic)?;
        Ok(update)
    }

    /// Run the difficulty ledger for one topic. Returns newly unlocked tiers.
    pub fn evaluate_difficulty_unlocks(
        &mut self,
        topic: &TopicId,
        score: u32,
        avg_response_time: f64,
    ) -> Result<Vec<Difficulty>> {
        let newly = self
            .difficulty
            .evaluate_unlocks(topic, score, avg_response_time);
        if !newly.is_empty() {
            self.persist_difficulty_ledger()?;
        }
        Ok(newly)
    }

    /// Run the module ledger against an outside stats provider.
    pub fn evaluate_module_unlocks(
        &mut self,
        stats: &dyn StatsProvider,
    ) -> Result<ModuleEvaluation> {
        let evaluation = self.modules.evaluate_unlocks(stats);
        if !evaluation.newly_unlocked.is_empty() {
            tracing::info!(modules = ?evaluation.newly_unlocked, "modules unlocked");
            self.persist_module_ledger()?;
        }
        Ok(evaluation)
    }

    /// Run the module ledger against figures derived from this profile.
    pub fn evaluate_module_unlocks_derived(&mut self) -> Result<ModuleEvaluation> {
        let config = self.modules.config().clone();
        let stats = DerivedStats::new(self.tracker.topics(), &config);
        let evaluation = self.modules.evaluate_unlocks(&stats);
        if !evaluation.newly_unlocked.is_empty() {
            tracing::info!(modules = ?evaluation.newly_unlocked, "modules unlocked");
            self.persist_module_ledger()?;
        }
        Ok(evaluation)
    }

    /// Start counting answers on `topic`. An open session is discarded.
    pub fn begin_session(&mut self, topic: &TopicId) {
        if let Some(old) = self.session.replace(Session::new(topic.clone())) {
            tracing::debug!(topic = %old.topic, "discarding unfinished session");
        }
    }

    pub fn session_stats(&self) -> Option<&SessionStats> {
        self.session.as_ref().map(|s| &s.stats)
    }

    /// Close the open session and feed it to the difficulty ledger.
    pub fn end_session(&mut self) -> Result<Option<SessionSummary>> {
        let Some(session) = self.session.take() else {
            return Ok(None);
        };
        let newly = self.evaluate_difficulty_unlocks(
            &session.topic,
            session.stats.score(),
            session.stats.avg_response_time(),
        )?;
        Ok(Some(SessionSummary {
            topic: session.topic,
            stats: session.stats,
            newly_unlocked: newly,
        }))
    }

    // --- Administrative ---

    /// Clear both ledgers. Topic progress is neither changed nor rewritten.
    pub fn lock_all(&mut self) -> Result<()> {
        tracing::info!("locking all difficulty tiers and modules");
        self.difficulty.set_open_all(false);
        self.modules.set_open_all(false);
        self.reset_ledgers(LedgerReset::Clear);
        self.persist_ledgers()
    }

    /// Unlock every tier of every known topic and every configured module.
    pub fn unlock_all(&mut self) -> Result<()> {
        tracing::info!("unlocking all difficulty tiers and modules");
        self.reset_ledgers(LedgerReset::Fill);
        self.persist_ledgers()
    }

    /// Replace the whole profile.
    pub fn import_snapshot(&mut self, snapshot: ProfileSnapshot) -> Result<()> {
        let (topics, difficulty, modules) = snapshot.into_parts();
        tracing::info!(topics = topics.len(), "importing profile snapshot");
        self.tracker.replace_all(topics);
        self.difficulty.replace_ledger(difficulty);
        self.modules.replace_ledger(modules);
        self.session = None;
        self.persist_all()
    }

    // --- Outbound ---

    /// Summary for `topic`. An unknown topic gets a default record, which is
    /// saved with the topic's first mutation.
    pub fn topic_progress(&mut self, topic: &TopicId) -> ProgressSummary {
        self.tracker.get_progress(topic).summary()
    }

    /// Full record including review history, if the topic exists.
    pub fn progress(&self, topic: &TopicId) -> Option<&TopicProgress> {
        self.tracker.progress(topic)
    }

    pub fn topics(&self) -> impl Iterator<Item = &TopicProgress> {
        self.tracker.topics().values()
    }

    /// Completion-flag gate.
    pub fn can_access_level(&self, topic: &TopicId, level: Difficulty) -> bool {
        self.tracker.can_access_level(topic, level)
    }

    /// Ledger gate.
    pub fn is_unlocked(&self, topic: &TopicId, level: Difficulty) -> bool {
        self.difficulty.is_unlocked(topic, level)
    }

    /// The configured combination of both gates.
    pub fn can_play(&self, topic: &TopicId, level: Difficulty) -> bool {
        let inputs = GateInputs {
            tracker: &self.tracker,
            ledger: &self.difficulty,
        };
        self.gate.allows(&inputs, topic, level)
    }

    pub fn unlocked_levels(&self, topic: &TopicId) -> Vec<Difficulty> {
        self.difficulty.unlocked(topic).into_iter().collect()
    }

    pub fn is_module_unlocked(&self, module: &ModuleId) -> bool {
        self.modules.is_module_unlocked(module)
    }

    pub fn modules(&self) -> Vec<ModuleId> {
        self.modules.config().module_ids()
    }

    pub fn is_topic_mastered(&self, topic: &TopicId) -> bool {
        self.tracker.is_topic_mastered(topic)
    }

    /// Fraction of known topics fully mastered.
    pub fn overall_progress(&self) -> f64 {
        self.tracker.overall_progress()
    }

    /// Questions of `topic` due for review now.
    pub fn due_reviews(&self, topic: &TopicId) -> Vec<&QuestionReviewState> {
        self.tracker.due_reviews(topic, self.now())
    }

    pub fn snapshot(&self) -> ProfileSnapshot {
        ProfileSnapshot::new(
            self.tracker.topics(),
            self.difficulty.ledger(),
            self.modules.ledger(),
            self.now(),
        )
    }
}
