//! Threshold ledger of unlocked content modules.
//!
//! A global gate (overall accuracy and learner level) must pass before any
//! module is looked at. Past the gate every module is judged on its own
//! mastery; list order is presentation order only, there is no chain.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::config::ModuleConfig;
use crate::ident::ModuleId;
use crate::tracker::TopicMap;

pub type ModuleLedger = BTreeSet<ModuleId>;

/// Aggregate learner figures the module gate is judged on.
pub trait StatsProvider {
    /// Overall accuracy in `[0, 1]`.
    fn overall_accuracy(&self) -> f64;
    fn level(&self) -> u32;
    /// Mastery of one module in `[0, 1]`.
    fn module_mastery(&self, module: &ModuleId) -> f64;
}

/// Fixed figures, as reported by an outside system.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticStats {
    pub accuracy: f64,
    pub level: u32,
    pub mastery: BTreeMap<ModuleId, f64>,
}

impl StatsProvider for StaticStats {
    fn overall_accuracy(&self) -> f64 {
        self.accuracy
    }

    fn level(&self) -> u32 {
        self.level
    }

    fn module_mastery(&self, module: &ModuleId) -> f64 {
        self.mastery.get(module).copied().unwrap_or(0.0)
    }
}

/// Figures computed from the learner's own topic progress:
/// accuracy is mean topic mastery, level counts completed tiers across all
/// topics, and a module's mastery is the mean mastery of its topics
/// (unplayed topics count as zero).
pub struct DerivedStats<'a> {
    topics: &'a TopicMap,
    config: &'a ModuleConfig,
}

impl<'a> DerivedStats<'a> {
    pub fn new(topics: &'a TopicMap, config: &'a ModuleConfig) -> Self {
        Self { topics, config }
    }
}

impl StatsProvider for DerivedStats<'_> {
    fn overall_accuracy(&self) -> f64 {
        if self.topics.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.topics.values().map(|p| p.mastery_score).sum();
        sum / self.topics.len() as f64
    }

    fn level(&self) -> u32 {
        self.topics.values().map(|p| p.completed_tiers()).sum()
    }

    fn module_mastery(&self, module: &ModuleId) -> f64 {
        let Some(def) = self.config.modules.iter().find(|m| &m.id == module) else {
            return 0.0;
        };
        if def.topics.is_empty() {
            return 0.0;
        }
        let sum: f64 = def
            .topics
            .iter()
            .map(|t| self.topics.get(t).map_or(0.0, |p| p.mastery_score))
            .sum();
        sum / def.topics.len() as f64
    }
}

/// Outcome of one module evaluation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleEvaluation {
    pub gate_passed: bool,
    pub newly_unlocked: Vec<ModuleId>,
}

pub struct ModuleUnlockEvaluator {
    ledger: ModuleLedger,
    config: ModuleConfig,
    open_all: bool,
}

impl ModuleUnlockEvaluator {
    pub fn new(config: ModuleConfig, ledger: ModuleLedger) -> Self {
        Self {
            ledger,
            config,
            open_all: false,
        }
    }

    pub fn set_open_all(&mut self, open_all: bool) {
        self.open_all = open_all;
    }

    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    pub fn ledger(&self) -> &ModuleLedger {
        &self.ledger
    }

    fn gate_passes(&self, stats: &dyn StatsProvider) -> bool {
        let c = &self.config;
        let configured =
            c.accuracy_threshold > 0.0 && c.level_threshold > 0 && c.mastery_threshold > 0.0;
        configured
            && stats.overall_accuracy() >= c.accuracy_threshold
            && stats.level() >= c.level_threshold
    }

    pub fn evaluate_unlocks(&mut self, stats: &dyn StatsProvider) -> ModuleEvaluation {
        if !self.gate_passes(stats) {
            tracing::debug!(
                accuracy = stats.overall_accuracy(),
                level = stats.level(),
                "module gate closed"
            );
            return ModuleEvaluation {
                gate_passed: false,
                newly_unlocked: Vec::new(),
            };
        }

        let threshold = self.config.mastery_threshold;
        let mut newly_unlocked = Vec::new();
        for def in &self.config.modules {
            if stats.module_mastery(&def.id) >= threshold && self.ledger.insert(def.id.clone()) {
                newly_unlocked.push(def.id.clone());
            }
        }

        tracing::debug!(newly = ?newly_unlocked, "evaluated module unlocks");
        ModuleEvaluation {
            gate_passed: true,
            newly_unlocked,
        }
    }

    pub fn is_module_unlocked(&self, module: &ModuleId) -> bool {
        self.open_all || self.ledger.contains(module)
    }

    /// Every configured module.
    pub fn unlock_all(&mut self) {
        self.ledger
            .extend(self.config.modules.iter().map(|m| m.id.clone()));
    }

    pub fn lock_all(&mut self) {
        self.ledger.clear();
    }

    pub(crate) fn replace_ledger(&mut self, ledger: ModuleLedger) {
        self.ledger = ledger;
    }
}
