use std::path::{Path, PathBuf};
use std::{env, fs};

use lp_core::EngineConfig;

use crate::error::{Result, StoreError};
use crate::store::Store;

pub const CONFIG_FILE: &str = "config.toml";
pub const DEFAULT_PROFILE: &str = "default";

/// Default base directory for all learner profiles.
pub fn default_base_dir() -> PathBuf {
    dirs_home().join(".learning-progression")
}

fn dirs_home() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Sanitize a profile name for use as a filename.
fn sanitize_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn resolve_profile(name: Option<&str>) -> String {
    name.map(sanitize_name)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| DEFAULT_PROFILE.to_string())
}

/// Parse engine configuration. Unknown keys are ignored and missing ones
/// take their defaults.
pub fn parse_config(content: &str) -> std::result::Result<EngineConfig, toml::de::Error> {
    toml::from_str(content)
}

/// Read `<base>/config.toml`. A missing file means defaults; an unreadable
/// or invalid one is logged and also means defaults.
pub fn load_config(base: &Path) -> EngineConfig {
    let path = base.join(CONFIG_FILE);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("no config at {}, using defaults", path.display());
            return EngineConfig::default();
        }
        Err(e) => {
            tracing::warn!("failed to read {}: {e}; using defaults", path.display());
            return EngineConfig::default();
        }
    };
    match parse_config(&content) {
        Ok(config) => {
            tracing::debug!("loaded config from {}", path.display());
            config
        }
        Err(e) => {
            tracing::warn!("invalid config {}: {e}; using defaults", path.display());
            EngineConfig::default()
        }
    }
}

/// One learner profile on disk.
///
/// Layout:
/// ```text
/// ~/.learning-progression/
/// ├── config.toml
/// └── profiles/
///     ├── default.db
///     └── <profile>.db
/// ```
pub struct ProfileStore {
    store: Store,
    profile: String,
    base: PathBuf,
}

impl ProfileStore {
    /// Open the profile's database, creating directories as needed.
    /// `base_dir` overrides the default base directory.
    pub fn open(profile: Option<&str>, base_dir: Option<&Path>) -> Result<Self> {
        let base = base_dir.map(PathBuf::from).unwrap_or_else(default_base_dir);
        let profiles_dir = base.join("profiles");

        fs::create_dir_all(&profiles_dir).map_err(|e| {
            StoreError::InvalidData(format!("failed to create {}: {e}", profiles_dir.display()))
        })?;

        let profile = resolve_profile(profile);
        let store = Store::open(&profiles_dir.join(format!("{profile}.db")))?;
        tracing::debug!(profile, base = %base.display(), "opened profile store");

        Ok(Self {
            store,
            profile,
            base,
        })
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn into_store(self) -> Store {
        self.store
    }

    pub fn load_config(&self) -> EngineConfig {
        load_config(&self.base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lp_core::{GateMode, UnlockPolicy};

    #[test]
    fn test_directory_creation() {
        let dir = tempfile::tempdir().unwrap();
        let ps = ProfileStore::open(Some("alice"), Some(dir.path())).unwrap();
        assert_eq!(ps.profile(), "alice");
        assert!(dir.path().join("profiles/alice.db").exists());
    }

    #[test]
    fn test_default_profile() {
        let dir = tempfile::tempdir().unwrap();
        let ps = ProfileStore::open(None, Some(dir.path())).unwrap();
        assert_eq!(ps.profile(), DEFAULT_PROFILE);
        let ps = ProfileStore::open(Some("   "), Some(dir.path())).unwrap();
        assert_eq!(ps.profile(), DEFAULT_PROFILE);
    }

    #[test]
    fn test_profile_name_sanitization() {
        assert_eq!(sanitize_name("hello world"), "hello_world");
        assert_eq!(sanitize_name("../etc"), "___etc");
        assert_eq!(sanitize_name("valid-name_123"), "valid-name_123");
    }

    #[test]
    fn test_profiles_are_isolated() {
        use lp_core::{ProgressStore, TopicId, TopicProgress};

        let dir = tempfile::tempdir().unwrap();
        let a = ProfileStore::open(Some("a"), Some(dir.path())).unwrap();
        let b = ProfileStore::open(Some("b"), Some(dir.path())).unwrap();
        a.store()
            .save_topic(&TopicProgress::new(TopicId::new("verbs").unwrap()))
            .unwrap();
        assert_eq!(a.store().topic_count().unwrap(), 1);
        assert_eq!(b.store().topic_count().unwrap(), 0);
    }

    #[test]
    fn test_missing_config_is_default() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_config(dir.path()), EngineConfig::default());
    }

    #[test]
    fn test_config_file_parsed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"
policy = "unlock-all"
gate = "both"

[tracker]
mastery_threshold = 0.9

[difficulty]
unlock_medium_score = 3

[modules]
level_threshold = 2

[[modules.modules]]
id = "Basics"
topics = ["greetings", "numbers"]
"#,
        )
        .unwrap();

        let config = load_config(dir.path());
        assert_eq!(config.policy, UnlockPolicy::UnlockAll);
        assert_eq!(config.gate, GateMode::Both);
        assert_eq!(config.tracker.mastery_threshold, 0.9);
        assert_eq!(config.tracker.smoothing_alpha, 0.3);
        assert_eq!(config.difficulty.unlock_medium_score, 3);
        assert_eq!(config.difficulty.unlock_hard_score, 8);
        assert_eq!(config.modules.level_threshold, 2);
        assert_eq!(config.modules.modules[0].id.as_str(), "basics");
        assert_eq!(config.modules.modules[0].topics.len(), 2);
    }

    #[test]
    fn test_invalid_config_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "policy = \"sideways\"").unwrap();
        assert_eq!(load_config(dir.path()), EngineConfig::default());
    }
}
