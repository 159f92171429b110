use std::fs;
use std::path::Path;

use lp_core::{export_json, import_json, now_unix_secs};

use crate::error::{Result, StoreError};
use crate::store::Store;

impl Store {
    /// Replace this profile with the snapshot in `path`.
    pub fn import_json_file(&self, path: &Path) -> Result<()> {
        let json = fs::read_to_string(path).map_err(|e| {
            StoreError::InvalidData(format!("failed to read {}: {e}", path.display()))
        })?;
        self.import_json_str(&json)
    }

    pub fn import_json_str(&self, json: &str) -> Result<()> {
        let snapshot =
            import_json(json).map_err(|e| StoreError::InvalidData(format!("invalid JSON: {e}")))?;
        self.save_snapshot(&snapshot)
    }

    pub fn export_json_file(&self, path: &Path) -> Result<()> {
        let json = self.export_json_string()?;
        fs::write(path, json).map_err(|e| {
            StoreError::InvalidData(format!("failed to write {}: {e}", path.display()))
        })
    }

    pub fn export_json_string(&self) -> Result<String> {
        let snapshot = self.load_snapshot(now_unix_secs())?;
        export_json(&snapshot)
            .map_err(|e| StoreError::InvalidData(format!("JSON export failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lp_core::{
        Difficulty, ModuleId, ProfileSnapshot, QuestionReviewState, TopicId, TopicProgress,
    };

    fn make_snapshot() -> ProfileSnapshot {
        let mut snapshot = ProfileSnapshot::empty();
        let mut p = TopicProgress::new(TopicId::new("colours").unwrap());
        p.is_easy_completed = true;
        p.current_level = Difficulty::Medium;
        p.mastery_score = 0.5;
        p.history.push(QuestionReviewState::new("c-1", Difficulty::Easy));
        snapshot.topics.push(p);
        snapshot.difficulty_unlocks.insert(
            TopicId::new("colours").unwrap(),
            [Difficulty::Easy, Difficulty::Medium].into_iter().collect(),
        );
        snapshot
            .module_unlocks
            .insert(ModuleId::new("starter").unwrap());
        snapshot
    }

    #[test]
    fn test_import_export_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        let original = make_snapshot();
        store
            .import_json_str(&export_json(&original).unwrap())
            .unwrap();

        let reimported = import_json(&store.export_json_string().unwrap()).unwrap();
        assert_eq!(reimported.topics, original.topics);
        assert_eq!(reimported.difficulty_unlocks, original.difficulty_unlocks);
        assert_eq!(reimported.module_unlocks, original.module_unlocks);
    }

    #[test]
    fn test_export_wire_format() {
        let store = Store::open_in_memory().unwrap();
        store
            .import_json_str(&export_json(&make_snapshot()).unwrap())
            .unwrap();

        let wire: serde_json::Value =
            serde_json::from_str(&store.export_json_string().unwrap()).unwrap();
        assert_eq!(wire["version"], lp_core::SNAPSHOT_VERSION);
        assert!(wire["exportedAt"].as_u64().unwrap() > 0);
        assert_eq!(wire["topics"][0]["currentLevel"], "medium");
        assert!(wire["difficultyUnlocks"]["colours"].is_array());
        assert_eq!(wire["moduleUnlocks"][0], "starter");
    }

    #[test]
    fn test_import_export_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("profile.json");

        let store = Store::open_in_memory().unwrap();
        store.save_snapshot(&make_snapshot()).unwrap();
        store.export_json_file(&json_path).unwrap();
        assert!(json_path.exists());

        let store2 = Store::open_in_memory().unwrap();
        store2.import_json_file(&json_path).unwrap();
        assert_eq!(store2.load_topics().unwrap().len(), 1);
        assert_eq!(store2.load_module_ledger().unwrap().len(), 1);
    }

    #[test]
    fn test_import_invalid_json() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.import_json_str("not valid json").is_err());
    }

    #[test]
    fn test_import_missing_file() {
        let store = Store::open_in_memory().unwrap();
        let err = store
            .import_json_file(Path::new("/nonexistent/profile.json"))
            .unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
