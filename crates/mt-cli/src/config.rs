//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use chrono::Duration;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use mt_core::{Policy, ProductionRange, ValidationError, Volume};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,

    /// Daily totals below this raise a low-production alert.
    pub low_production_liters: Volume,

    /// Daily totals above this raise a high-production alert.
    pub high_production_liters: Volume,

    /// Hours a batch stays fresh after its earliest milking.
    pub freshness_hours: i64,

    /// How long a mutation waits for the write lock.
    pub busy_timeout_ms: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("low_production_liters", &self.low_production_liters.to_string())
            .field("high_production_liters", &self.high_production_liters.to_string())
            .field("freshness_hours", &self.freshness_hours)
            .field("busy_timeout_ms", &self.busy_timeout_ms)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        let policy = Policy::default();
        Self {
            database_path: data_dir.join("mt.db"),
            low_production_liters: policy.production_range.low,
            high_production_liters: policy.production_range.high,
            freshness_hours: policy.freshness_window.num_hours(),
            busy_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Loads configuration from default locations.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(None)
    }

    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // MT_DATABASE_PATH, MT_FRESHNESS_HOURS, ...
        figment = figment.merge(Env::prefixed("MT_"));

        figment.extract()
    }

    /// The freshness and production policy these settings describe.
    pub fn policy(&self) -> Result<Policy, ValidationError> {
        let range = ProductionRange::new(self.low_production_liters, self.high_production_liters)?;
        Policy::new(Duration::hours(self.freshness_hours), range)
    }

    pub const fn busy_timeout(&self) -> StdDuration {
        StdDuration::from_millis(self.busy_timeout_ms)
    }
}

/// Returns the platform-specific config directory for mt.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("mt"))
}

/// Returns the platform-specific data directory for mt.
///
/// On Linux: `~/.local/share/mt`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("mt"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_data_path_ends_with_mt() {
        let path = dirs_data_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "mt");
    }

    #[test]
    fn test_default_config_uses_data_dir_for_db() {
        let config = Config::default();
        let data_dir = dirs_data_path().unwrap();
        assert_eq!(config.database_path, data_dir.join("mt.db"));
    }

    #[test]
    fn test_default_policy_matches_core_defaults() {
        let config = Config::default();
        assert_eq!(config.policy().unwrap(), Policy::default());
        assert_eq!(config.busy_timeout(), StdDuration::from_secs(5));
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            "database_path = \"/srv/farm/mt.db\"\n\
             low_production_liters = 12.5\n\
             high_production_liters = 30\n\
             freshness_hours = 6\n",
        )
        .unwrap();

        let config = Config::load_from(Some(&path)).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/srv/farm/mt.db"));
        assert_eq!(config.low_production_liters, Volume::from_milliliters(12_500));

        let policy = config.policy().unwrap();
        assert_eq!(policy.freshness_window, Duration::hours(6));
        assert_eq!(policy.production_range.high, Volume::from_liters(30));
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let config = Config {
            low_production_liters: Volume::from_liters(30),
            high_production_liters: Volume::from_liters(20),
            ..Config::default()
        };
        assert!(matches!(
            config.policy(),
            Err(ValidationError::InvalidPolicy { .. })
        ));
    }

    #[test]
    fn test_non_positive_freshness_is_rejected() {
        let config = Config {
            freshness_hours: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.policy(),
            Err(ValidationError::InvalidPolicy { .. })
        ));
    }
}
