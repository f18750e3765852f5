//! Configuration file parser for ~/.config/feedcull/config.toml.
//!
//! Unlike most settings files the config is required: there is no useful
//! default for the Miniflux host. `MINIFLUX_HOSTNAME` and `MINIFLUX_API_KEY`
//! override the file so credentials can stay out of it. Unknown keys are
//! accepted with a warning.
use chrono::Duration;
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::triage::{CategoryPolicy, Rule, RuleSet};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// Values parsed but do not describe a runnable setup.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct MinifluxConfig {
    /// Base URL of the Miniflux instance, e.g. `https://reader.example.com`.
    pub hostname: String,
    /// API token. `MINIFLUX_API_KEY` takes precedence.
    pub api_key: Option<String>,
}

/// Skip entries whose URL has this exact host and a matching path.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ExcludePattern {
    pub host: String,
    pub path_prefix: Option<String>,
    pub path_contains: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CategoryConfig {
    /// Miniflux category id.
    pub id: i64,
    /// Entries left unread for review per cycle.
    #[serde(default = "default_keep")]
    pub keep: usize,
    /// Entries older than this are skipped. No age rule when absent.
    pub max_age_hours: Option<i64>,
    #[serde(default)]
    pub exclude: Vec<ExcludePattern>,
}

fn default_keep() -> usize {
    10
}

/// Top-level application configuration.
///
/// Custom Debug impl masks the API key.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Minutes between triage cycles.
    pub interval_minutes: u64,

    /// SQLite file holding migrations, mirrored feeds and ratings.
    /// Defaults to `ratings.db` next to the config file.
    pub database_path: Option<PathBuf>,

    pub miniflux: MinifluxConfig,

    pub categories: Vec<CategoryConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval_minutes: 10,
            database_path: None,
            miniflux: MinifluxConfig::default(),
            categories: Vec::new(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("interval_minutes", &self.interval_minutes)
            .field("database_path", &self.database_path)
            .field("miniflux_hostname", &self.miniflux.hostname)
            .field(
                "miniflux_api_key",
                &self.miniflux.api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("categories", &self.categories)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Upper bound for age rules (100 years).
    const MAX_AGE_HOURS: i64 = 24 * 365 * 100;

    const KNOWN_KEYS: [&'static str; 4] =
        ["interval_minutes", "database_path", "miniflux", "categories"];

    /// Load, apply environment overrides, and validate, Miniflux
    /// credentials included.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read_with_env(path)?;
        config.validate()?;
        config.log_loaded(path);
        Ok(config)
    }

    /// Like [`load`](Self::load) for commands that only touch the rating
    /// store: Miniflux credentials may be missing.
    pub fn load_offline(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read_with_env(path)?;
        config.validate_settings()?;
        config.log_loaded(path);
        Ok(config)
    }

    fn read_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env(
            std::env::var("MINIFLUX_HOSTNAME").ok(),
            std::env::var("MINIFLUX_API_KEY").ok(),
        );
        Ok(config)
    }

    fn log_loaded(&self, path: &Path) {
        tracing::info!(
            path = %path.display(),
            categories = self.categories.len(),
            interval_minutes = self.interval_minutes,
            "Loaded configuration"
        );
    }

    /// Parse a TOML file without validation or environment overrides.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        let meta = std::fs::metadata(path).map_err(io_err)?;
        if meta.len() > Self::MAX_FILE_SIZE {
            return Err(ConfigError::TooLarge(format!(
                "Config file is {} bytes (max {} bytes)",
                meta.len(),
                Self::MAX_FILE_SIZE
            )));
        }

        let content = std::fs::read_to_string(path).map_err(io_err)?;
        Self::from_toml(&content)
    }

    /// Parse TOML content; unknown top-level keys are logged and ignored.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }
        Ok(toml::from_str(content)?)
    }

    /// Environment values win over the file when set and non-empty.
    pub fn apply_env(&mut self, hostname: Option<String>, api_key: Option<String>) {
        if let Some(hostname) = hostname.filter(|h| !h.trim().is_empty()) {
            self.miniflux.hostname = hostname;
        }
        if let Some(api_key) = api_key.filter(|k| !k.trim().is_empty()) {
            self.miniflux.api_key = Some(api_key);
        }
    }

    /// Full validation: Miniflux credentials plus [`validate_settings`](Self::validate_settings).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.miniflux.hostname.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "Miniflux hostname not set (miniflux.hostname or MINIFLUX_HOSTNAME)".to_string(),
            ));
        }
        if self
            .miniflux
            .api_key
            .as_deref()
            .map_or(true, |k| k.trim().is_empty())
        {
            return Err(ConfigError::Invalid(
                "Miniflux API key not set (miniflux.api_key or MINIFLUX_API_KEY)".to_string(),
            ));
        }
        self.validate_settings()
    }

    /// Validate everything except Miniflux credentials.
    pub fn validate_settings(&self) -> Result<(), ConfigError> {
        if self.interval_minutes == 0 {
            return Err(ConfigError::Invalid(
                "interval_minutes must be greater than zero".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for category in &self.categories {
            if !seen.insert(category.id) {
                return Err(ConfigError::Invalid(format!(
                    "Category {} is configured more than once",
                    category.id
                )));
            }
            if let Some(hours) = category.max_age_hours {
                if hours <= 0 || hours > Self::MAX_AGE_HOURS {
                    return Err(ConfigError::Invalid(format!(
                        "Category {}: max_age_hours must be between 1 and {}",
                        category.id,
                        Self::MAX_AGE_HOURS
                    )));
                }
            }
            for pattern in &category.exclude {
                pattern.to_rule().map_err(|reason| {
                    ConfigError::Invalid(format!("Category {}: {}", category.id, reason))
                })?;
            }
        }
        Ok(())
    }

    pub fn api_key(&self) -> SecretString {
        SecretString::from(self.miniflux.api_key.clone().unwrap_or_default())
    }

    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }

    /// Database path, defaulting to `ratings.db` in `config_dir`.
    pub fn database_path(&self, config_dir: &Path) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| config_dir.join("ratings.db"))
    }

    /// Turn category settings into triage policies. Call after [`validate`](Self::validate).
    pub fn policies(&self) -> Result<Vec<CategoryPolicy>, ConfigError> {
        self.categories.iter().map(CategoryConfig::policy).collect()
    }
}

impl ExcludePattern {
    fn to_rule(&self) -> Result<Rule, String> {
        if self.host.trim().is_empty() {
            return Err("exclude pattern has an empty host".to_string());
        }
        // Parsed URLs report hosts in lowercase
        let host = self.host.trim().to_ascii_lowercase();
        match (&self.path_prefix, &self.path_contains) {
            (Some(prefix), None) => Ok(Rule::HostPathPrefix {
                host,
                prefix: prefix.clone(),
            }),
            (None, Some(needle)) => Ok(Rule::HostPathContains {
                host,
                needle: needle.clone(),
            }),
            _ => Err(format!(
                "exclude pattern for host '{}' needs exactly one of path_prefix or path_contains",
                self.host
            )),
        }
    }
}

impl CategoryConfig {
    fn policy(&self) -> Result<CategoryPolicy, ConfigError> {
        let mut rules = self
            .exclude
            .iter()
            .map(|p| {
                p.to_rule().map_err(|reason| {
                    ConfigError::Invalid(format!("Category {}: {}", self.id, reason))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(hours) = self.max_age_hours {
            rules.push(Rule::MaxAge(Duration::hours(hours)));
        }

        Ok(CategoryPolicy {
            category_id: self.id,
            keep_limit: self.keep,
            rules: RuleSet::new(rules),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FULL: &str = r#"
interval_minutes = 15
database_path = "/var/lib/feedcull/ratings.db"

[miniflux]
hostname = "https://reader.example.com"
api_key = "file-key"

[[categories]]
id = 2
keep = 5
max_age_hours = 168

[[categories.exclude]]
host = "www.youtube.com"
path_prefix = "/shorts"

[[categories.exclude]]
host = "cdn.media.ccc.de"
path_contains = "-deu-"

[[categories]]
id = 3
"#;

    #[test]
    fn test_full_config() {
        let config = Config::from_toml(FULL).unwrap();
        config.validate().unwrap();

        assert_eq!(config.interval_minutes, 15);
        assert_eq!(config.interval(), std::time::Duration::from_secs(900));
        assert_eq!(
            config.database_path(Path::new("/unused")),
            PathBuf::from("/var/lib/feedcull/ratings.db")
        );
        assert_eq!(config.categories.len(), 2);
        assert_eq!(config.categories[1].keep, 10); // default
        assert_eq!(config.categories[1].max_age_hours, None);
    }

    #[test]
    fn test_policies_from_config() {
        let config = Config::from_toml(FULL).unwrap();
        let policies = config.policies().unwrap();

        assert_eq!(policies[0].category_id, 2);
        assert_eq!(policies[0].keep_limit, 5);
        assert_eq!(
            policies[0].rules.rules(),
            &[
                Rule::HostPathPrefix {
                    host: "www.youtube.com".to_string(),
                    prefix: "/shorts".to_string(),
                },
                Rule::HostPathContains {
                    host: "cdn.media.ccc.de".to_string(),
                    needle: "-deu-".to_string(),
                },
                Rule::MaxAge(Duration::hours(168)),
            ]
        );
        assert!(policies[1].rules.rules().is_empty());
    }

    #[test]
    fn test_default_database_path() {
        let config = Config::default();
        assert_eq!(
            config.database_path(Path::new("/home/u/.config/feedcull")),
            PathBuf::from("/home/u/.config/feedcull/ratings.db")
        );
        assert_eq!(config.interval_minutes, 10);
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = Config::from_toml(FULL).unwrap();
        config.apply_env(
            Some("https://other.example.com".to_string()),
            Some("env-key".to_string()),
        );
        assert_eq!(config.miniflux.hostname, "https://other.example.com");
        assert_eq!(config.miniflux.api_key.as_deref(), Some("env-key"));
    }

    #[test]
    fn test_empty_env_does_not_override() {
        let mut config = Config::from_toml(FULL).unwrap();
        config.apply_env(Some(String::new()), Some("  ".to_string()));
        assert_eq!(config.miniflux.hostname, "https://reader.example.com");
        assert_eq!(config.miniflux.api_key.as_deref(), Some("file-key"));
    }

    #[test]
    fn test_missing_hostname_invalid() {
        let config = Config::from_toml("[miniflux]\napi_key = \"k\"\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_api_key_invalid() {
        let config = Config::from_toml("[miniflux]\nhostname = \"https://r.example\"\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("API key"));
    }

    #[test]
    fn test_settings_valid_without_credentials() {
        let config = Config::from_toml("interval_minutes = 5\n").unwrap();
        assert!(config.validate().is_err());
        config.validate_settings().unwrap();
    }

    #[test]
    fn test_load_offline_accepts_missing_credentials() {
        let dir = std::env::temp_dir().join("feedcull_config_test_offline");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "database_path = \"/tmp/ratings.db\"\n").unwrap();

        let config = Config::load_offline(&path).unwrap();
        assert_eq!(
            config.database_path(Path::new("/unused")),
            PathBuf::from("/tmp/ratings.db")
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_exclude_host_is_case_insensitive() {
        let content = r#"
[miniflux]
hostname = "https://r.example"
api_key = "k"

[[categories]]
id = 2

[[categories.exclude]]
host = "www.YouTube.com"
path_prefix = "/shorts"
"#;
        let config = Config::from_toml(content).unwrap();
        config.validate().unwrap();
        let policies = config.policies().unwrap();
        assert_eq!(
            policies[0].rules.rules(),
            &[Rule::HostPathPrefix {
                host: "www.youtube.com".to_string(),
                prefix: "/shorts".to_string(),
            }]
        );

        let now = chrono::Utc::now();
        let entry = crate::domain::Entry {
            id: 1,
            feed_id: 1,
            title: "Short".to_string(),
            url: "https://www.YouTube.com/shorts/x".to_string(),
            content: String::new(),
            published_at: now,
        };
        assert_eq!(
            policies[0].rules.evaluate(&entry, now).unwrap(),
            crate::triage::Verdict::Skip
        );
    }

    #[test]
    fn test_zero_interval_invalid() {
        let content = format!("interval_minutes = 0\n{}", &FULL[FULL.find("[miniflux]").unwrap()..]);
        let config = Config::from_toml(&content).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_duplicate_category_invalid() {
        let content = r#"
[miniflux]
hostname = "https://r.example"
api_key = "k"

[[categories]]
id = 2

[[categories]]
id = 2
"#;
        let err = Config::from_toml(content).unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_pattern_needs_exactly_one_path_matcher() {
        let both = r#"
[miniflux]
hostname = "https://r.example"
api_key = "k"

[[categories]]
id = 2

[[categories.exclude]]
host = "www.youtube.com"
path_prefix = "/shorts"
path_contains = "x"
"#;
        let err = Config::from_toml(both).unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("exactly one"));

        let neither = both.replace("path_prefix = \"/shorts\"\npath_contains = \"x\"\n", "");
        assert!(Config::from_toml(&neither).unwrap().validate().is_err());
    }

    #[test]
    fn test_unknown_pattern_field_is_parse_error() {
        let content = r#"
[[categories]]
id = 2

[[categories.exclude]]
host = "www.youtube.com"
path_regex = ".*"
"#;
        assert!(matches!(
            Config::from_toml(content),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_unknown_top_level_keys_accepted() {
        let content = format!("totally_fake_key = 1\n{}", FULL);
        assert!(Config::from_toml(&content).is_ok());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = Config::from_file(Path::new("/tmp/feedcull_test_nonexistent_config.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("feedcull_config_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "#".repeat(1_048_577)).unwrap();

        let result = Config::from_file(&path);
        assert!(matches!(result, Err(ConfigError::TooLarge(_))));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_from_file_reads_toml() {
        let dir = std::env::temp_dir().join("feedcull_config_test_read");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, FULL).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.categories[0].id, 2);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_debug_masks_api_key() {
        let config = Config::from_toml(FULL).unwrap();
        let debug_output = format!("{:?}", config);
        assert!(!debug_output.contains("file-key"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}
