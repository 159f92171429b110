//! JSON snapshot of a whole learner profile.
//!
//! The wire format uses camelCase names. Topic ids and module ids are
//! validated on the way in, and every imported topic is repaired so that a
//! hand-edited file cannot break engine invariants.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::constants::SNAPSHOT_VERSION;
use crate::difficulty::Difficulty;
use crate::difficulty_unlock::DifficultyLedger;
use crate::ident::{ModuleId, TopicId};
use crate::module_unlock::ModuleLedger;
use crate::progress::TopicProgress;
use crate::time::UnixSecs;
use crate::tracker::TopicMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSnapshot {
    pub version: String,
    #[serde(default)]
    pub exported_at: UnixSecs,
    #[serde(default)]
    pub topics: Vec<TopicProgress>,
    #[serde(default)]
    pub difficulty_unlocks: BTreeMap<TopicId, BTreeSet<Difficulty>>,
    #[serde(default)]
    pub module_unlocks: BTreeSet<ModuleId>,
}

impl ProfileSnapshot {
    pub fn new(
        topics: &TopicMap,
        difficulty: &DifficultyLedger,
        modules: &ModuleLedger,
        exported_at: UnixSecs,
    ) -> Self {
        Self {
            version: SNAPSHOT_VERSION.to_string(),
            exported_at,
            topics: topics.values().cloned().collect(),
            difficulty_unlocks: difficulty.clone(),
            module_unlocks: modules.clone(),
        }
    }

    pub fn empty() -> Self {
        Self::new(&TopicMap::new(), &DifficultyLedger::new(), &ModuleLedger::new(), 0)
    }

    /// Split into the three persisted records. Later duplicates of a topic
    /// win; every topic is repaired.
    pub fn into_parts(self) -> (TopicMap, DifficultyLedger, ModuleLedger) {
        let mut topics = TopicMap::new();
        for mut progress in self.topics {
            if progress.repair() {
                tracing::warn!(topic = %progress.topic, "repaired imported topic progress");
            }
            topics.insert(progress.topic.clone(), progress);
        }
        (topics, self.difficulty_unlocks, self.module_unlocks)
    }
}

pub fn export_json(snapshot: &ProfileSnapshot) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(snapshot)
}

pub fn import_json(json: &str) -> Result<ProfileSnapshot, serde_json::Error> {
    let snapshot: ProfileSnapshot = serde_json::from_str(json)?;
    if snapshot.version != SNAPSHOT_VERSION {
        tracing::warn!(
            version = %snapshot.version,
            expected = SNAPSHOT_VERSION,
            "importing snapshot with unexpected version"
        );
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::QuestionReviewState;

    fn topic(name: &str) -> TopicId {
        TopicId::new(name).unwrap()
    }

    fn sample() -> ProfileSnapshot {
        let mut topics = TopicMap::new();
        let mut p = TopicProgress::new(topic("verbs"));
        p.is_easy_completed = true;
        p.current_level = Difficulty::Medium;
        p.mastery_score = 0.42;
        p.history.push(QuestionReviewState::new("v-1", Difficulty::Easy));
        topics.insert(p.topic.clone(), p);

        let mut difficulty = DifficultyLedger::new();
        difficulty.insert(
            topic("verbs"),
            [Difficulty::Easy, Difficulty::Medium].into_iter().collect(),
        );
        let modules: ModuleLedger = [ModuleId::new("core-grammar").unwrap()].into_iter().collect();

        ProfileSnapshot::new(&topics, &difficulty, &modules, 1_700_000_000)
    }

    #[test]
    fn test_wire_shape() {
        let json = export_json(&sample()).unwrap();
        let wire: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(wire["version"], SNAPSHOT_VERSION);
        assert_eq!(wire["topics"][0]["topic"], "verbs");
        assert_eq!(wire["topics"][0]["history"][0]["questionId"], "v-1");
        assert_eq!(wire["difficultyUnlocks"]["verbs"][1], "medium");
        assert_eq!(wire["moduleUnlocks"][0], "core-grammar");
    }

    #[test]
    fn test_import_restores_parts() {
        let json = export_json(&sample()).unwrap();
        let (topics, difficulty, modules) = import_json(&json).unwrap().into_parts();
        let verbs = topics.get(&topic("verbs")).unwrap();
        assert_eq!(verbs.current_level, Difficulty::Medium);
        assert_eq!(verbs.history.len(), 1);
        assert!(difficulty[&topic("verbs")].contains(&Difficulty::Medium));
        assert_eq!(modules.len(), 1);
    }

    #[test]
    fn test_import_repairs_bad_topic() {
        let json = r#"{
            "version": "1",
            "topics": [{
                "topic": "Verbs",
                "currentLevel": "easy",
                "isEasyCompleted": false,
                "isMediumCompleted": true,
                "isHardCompleted": false,
                "masteryScore": 3.5
            }]
        }"#;
        let (topics, difficulty, modules) = import_json(json).unwrap().into_parts();
        let verbs = topics.get(&topic("verbs")).unwrap();
        assert!(!verbs.is_medium_completed);
        assert_eq!(verbs.mastery_score, 1.0);
        assert!(difficulty.is_empty());
        assert!(modules.is_empty());
    }

    #[test]
    fn test_import_rejects_invalid_ids() {
        let json = r#"{"version": "1", "moduleUnlocks": ["no spaces allowed?"]}"#;
        assert!(import_json(json).is_err());
    }

    #[test]
    fn test_import_rejects_garbage() {
        assert!(import_json("not json").is_err());
    }
}
