//! Store configuration and backend factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use quizforge_core::engine::{ExamEngineConfig, SamplingStrategy};
use quizforge_core::hard_mode::DEFAULT_HARD_THRESHOLD;
use quizforge_core::traits::QuizBackend;
use quizforge_core::weights::CategoryWeights;

use crate::memory::MemoryStore;
use crate::rest::RestStore;

/// Environment variable that overrides the REST API key.
pub const API_KEY_ENV: &str = "QUIZFORGE_API_KEY";

/// Where questions and attempts live.
///
/// Note: Custom Debug impl masks the API key so it never reaches the logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    Memory {
        /// Directory of TOML question banks to seed from.
        #[serde(default)]
        bank_dir: Option<PathBuf>,
    },
    Rest {
        base_url: String,
        api_key: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreConfig::Memory { bank_dir } => f
                .debug_struct("Memory")
                .field("bank_dir", bank_dir)
                .finish(),
            StoreConfig::Rest {
                base_url,
                api_key: _,
                timeout_secs,
            } => f
                .debug_struct("Rest")
                .field("base_url", base_url)
                .field("api_key", &"***")
                .field("timeout_secs", timeout_secs)
                .finish(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Memory { bank_dir: None }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

/// Top-level quizforge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizforgeConfig {
    #[serde(default)]
    pub store: StoreConfig,
    /// Sampling weight per category. Unlisted categories weigh 1.
    #[serde(default)]
    pub category_weights: CategoryWeights,
    /// Accuracy below which a question counts as hard.
    #[serde(default = "default_hard_threshold")]
    pub hard_threshold: f64,
    /// Question count for mixed exams requested without a limit.
    #[serde(default = "default_marathon_cap")]
    pub marathon_cap: usize,
    #[serde(default = "default_quick_exam_size")]
    pub quick_exam_size: usize,
    /// Size of standard mixed exams and category drills.
    #[serde(default = "default_standard_exam_size")]
    pub standard_exam_size: usize,
    #[serde(default = "default_hard_exam_size")]
    pub hard_exam_size: usize,
    #[serde(default)]
    pub sampling: SamplingStrategy,
    /// Percent accuracy shown as mastered in progress reports.
    #[serde(default = "default_green_limit")]
    pub mastery_green_limit: u32,
}

fn default_hard_threshold() -> f64 {
    DEFAULT_HARD_THRESHOLD
}
fn default_marathon_cap() -> usize {
    100
}
fn default_quick_exam_size() -> usize {
    10
}
fn default_standard_exam_size() -> usize {
    40
}
fn default_hard_exam_size() -> usize {
    50
}
fn default_green_limit() -> u32 {
    70
}

impl Default for QuizforgeConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            category_weights: CategoryWeights::default(),
            hard_threshold: default_hard_threshold(),
            marathon_cap: default_marathon_cap(),
            quick_exam_size: default_quick_exam_size(),
            standard_exam_size: default_standard_exam_size(),
            hard_exam_size: default_hard_exam_size(),
            sampling: SamplingStrategy::default(),
            mastery_green_limit: default_green_limit(),
        }
    }
}

impl QuizforgeConfig {
    /// Engine settings carried by this config.
    pub fn engine_config(&self) -> ExamEngineConfig {
        ExamEngineConfig {
            hard_threshold: self.hard_threshold.clamp(0.0, 1.0),
            marathon_cap: self.marathon_cap.max(1),
            quick_exam_size: self.quick_exam_size,
            standard_exam_size: self.standard_exam_size,
            hard_exam_size: self.hard_exam_size,
            sampling: self.sampling,
            mastery_green_limit: self.mastery_green_limit.min(100),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        result.push_str(&rest[..start]);
        let var_name = &rest[start + 2..start + len];
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + len + 1..];
    }
    result.push_str(rest);
    result
}

fn resolve_store_config(config: &StoreConfig) -> StoreConfig {
    match config {
        StoreConfig::Memory { bank_dir } => StoreConfig::Memory {
            bank_dir: bank_dir
                .as_ref()
                .map(|p| PathBuf::from(resolve_env_vars(&p.to_string_lossy()))),
        },
        StoreConfig::Rest {
            base_url,
            api_key,
            timeout_secs,
        } => StoreConfig::Rest {
            base_url: resolve_env_vars(base_url),
            api_key: resolve_env_vars(api_key),
            timeout_secs: *timeout_secs,
        },
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `quizforge.toml` in the current directory
/// 2. `~/.config/quizforge/config.toml`
///
/// `QUIZFORGE_API_KEY` overrides the key of a REST store.
pub fn load_config() -> Result<QuizforgeConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<QuizforgeConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("quizforge.toml");
            if local.exists() {
                Some(local)
            } else {
                config_dir()
                    .map(|dir| dir.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => QuizforgeConfig::default(),
    };

    if let Ok(key) = std::env::var(API_KEY_ENV) {
        if let StoreConfig::Rest { api_key, .. } = &mut config.store {
            *api_key = key;
        }
    }

    Ok(config)
}

/// Parse a TOML config string and resolve `${VAR}` references.
pub fn parse_config(content: &str) -> Result<QuizforgeConfig> {
    let mut config: QuizforgeConfig = toml::from_str(content)?;
    config.store = resolve_store_config(&config.store);
    Ok(config)
}

fn config_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("quizforge"))
}

/// Create a backend instance from its configuration.
pub fn create_backend(config: &StoreConfig) -> Result<Arc<dyn QuizBackend>> {
    match config {
        StoreConfig::Memory { bank_dir: None } => Ok(Arc::new(MemoryStore::default())),
        StoreConfig::Memory {
            bank_dir: Some(dir),
        } => Ok(Arc::new(MemoryStore::from_bank_dir(dir)?)),
        StoreConfig::Rest {
            base_url,
            api_key,
            timeout_secs,
        } => {
            if api_key.is_empty() {
                anyhow::bail!("rest store needs an api_key (or set {API_KEY_ENV})");
            }
            let store = RestStore::with_timeout(base_url, api_key, *timeout_secs)
                .context("failed to create rest store")?;
            Ok(Arc::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizforge_core::traits::QuestionSource;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_QUIZFORGE_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_QUIZFORGE_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_QUIZFORGE_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env_vars("no vars"), "no vars");
        assert_eq!(resolve_env_vars("open ${brace"), "open ${brace");
        std::env::remove_var("_QUIZFORGE_TEST_VAR");
    }

    #[test]
    fn default_config() {
        let config = QuizforgeConfig::default();
        assert!(matches!(config.store, StoreConfig::Memory { bank_dir: None }));
        assert_eq!(config.hard_threshold, 0.60);
        assert_eq!(config.marathon_cap, 100);
        assert_eq!(config.quick_exam_size, 10);
        assert_eq!(config.standard_exam_size, 40);
        assert_eq!(config.hard_exam_size, 50);
        assert_eq!(config.sampling, SamplingStrategy::Local);
        assert_eq!(config.mastery_green_limit, 70);
    }

    #[test]
    fn parse_full_config() {
        std::env::set_var("_QUIZFORGE_TEST_KEY", "anon-from-env");
        let config = parse_config(
            r#"
sampling = "delegated"
quick_exam_size = 30
mastery_green_limit = 80

[store]
type = "rest"
base_url = "https://example.supabase.co"
api_key = "${_QUIZFORGE_TEST_KEY}"

[category_weights]
Kirurgi = 10
Ortopedi = 8
Rättsmedicin = 2
"#,
        )
        .unwrap();
        std::env::remove_var("_QUIZFORGE_TEST_KEY");

        assert_eq!(config.sampling, SamplingStrategy::Delegated);
        assert_eq!(config.quick_exam_size, 30);
        assert_eq!(config.standard_exam_size, 40);
        assert_eq!(config.hard_exam_size, 50);
        assert_eq!(config.category_weights.weight("Kirurgi"), 10);
        assert_eq!(config.category_weights.weight("Onkologi"), 1);
        match &config.store {
            StoreConfig::Rest {
                api_key,
                timeout_secs,
                ..
            } => {
                assert_eq!(api_key, "anon-from-env");
                assert_eq!(*timeout_secs, 30);
            }
            other => panic!("expected rest store, got {other:?}"),
        }
        assert_eq!(config.engine_config().mastery_green_limit, 80);
    }

    #[test]
    fn debug_masks_api_key() {
        let config = StoreConfig::Rest {
            base_url: "https://example.supabase.co".into(),
            api_key: "super-secret".into(),
            timeout_secs: 30,
        };
        let printed = format!("{config:?}");
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("***"));
    }

    #[test]
    fn load_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quizforge.toml");
        std::fs::write(&path, "marathon_cap = 25\n").unwrap();
        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.marathon_cap, 25);

        assert!(load_config_from(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn engine_config_clamps_values() {
        let config = QuizforgeConfig {
            hard_threshold: 1.5,
            marathon_cap: 0,
            ..QuizforgeConfig::default()
        };
        let engine = config.engine_config();
        assert_eq!(engine.hard_threshold, 1.0);
        assert_eq!(engine.marathon_cap, 1);
    }

    #[test]
    fn rest_backend_needs_key() {
        let config = StoreConfig::Rest {
            base_url: "https://example.supabase.co".into(),
            api_key: String::new(),
            timeout_secs: 30,
        };
        assert!(create_backend(&config).is_err());
    }

    #[test]
    fn memory_backend_from_default() {
        let backend = create_backend(&StoreConfig::default()).unwrap();
        assert_eq!(backend.name(), "memory");
    }
}
