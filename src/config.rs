use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::budget::{AllocationOrder, BudgetTable, ExclusionTable, OwnerBudget};
use crate::github::{GitHubConfig, DEFAULT_API_BASE};
use crate::metrics::SqlBasis;
use crate::sync::SyncPaths;

pub const DEFAULT_CONFIG_FILE: &str = "campaign_planner.toml";
pub const ENV_GITHUB_TOKEN: &str = "CAMPAIGN_PLANNER_GITHUB_TOKEN";
pub const ENV_DATA_DIR: &str = "CAMPAIGN_PLANNER_DATA_DIR";
pub const ENV_LOG_LEVEL: &str = "CAMPAIGN_PLANNER_LOG_LEVEL";

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
    pub budget: BudgetConfig,
    pub reporting: ReportingConfig,
    pub github: Option<GitHubSettings>,
    pub sync: SyncConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub sql_basis: SqlBasis,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    pub order: AllocationOrder,
    /// Replaces the built-in owner table when non-empty.
    pub owners: Vec<OwnerBudget>,
    pub excluded_types: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    pub excluded_types: Option<Vec<String>>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct GitHubSettings {
    pub owner: String,
    pub repo: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub campaigns_path: Option<String>,
    #[serde(default)]
    pub budgets_path: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub debounce_secs: u64,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub data_dir: Option<PathBuf>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("GitHub sync is not configured; add a [github] section")]
    GitHubNotConfigured,
    #[error("GitHub token missing; set {0}")]
    MissingToken(&'static str),
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl From<ConfigError> for crate::error::PlannerError {
    fn from(e: ConfigError) -> Self {
        crate::error::PlannerError::Config(e.to_string())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            data_dir: PathBuf::from(".campaign_planner"),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
            budget: BudgetConfig::default(),
            reporting: ReportingConfig::default(),
            github: None,
            sync: SyncConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig { level: "info".to_string(), format: LogFormat::Compact }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig { debounce_secs: 60 }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let path = options
            .config_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else if options.require_file {
            return Err(ConfigError::MissingConfigFile(path));
        } else {
            AppConfig::default()
        };

        if let Ok(dir) = env::var(ENV_DATA_DIR) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(level) = env::var(ENV_LOG_LEVEL) {
            config.logging.level = level;
        }
        if let Some(dir) = options.overrides.data_dir {
            config.data_dir = dir;
        }
        if let Some(level) = options.overrides.log_level {
            config.logging.level = level;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)
            .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
        Self::from_toml(&text).map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for o in &self.budget.owners {
            if o.owner.trim().is_empty() {
                return Err(ConfigError::Validation("budget owner name is empty".into()));
            }
            if matches!(o.assigned_budget, Some(b) if b < 0.0) {
                return Err(ConfigError::Validation(format!("budget for {} must be >= 0", o.owner)));
            }
        }
        if self.sync.debounce_secs == 0 {
            return Err(ConfigError::Validation("sync.debounce_secs must be > 0".into()));
        }
        Ok(())
    }

    pub fn budget_table(&self) -> BudgetTable {
        if self.budget.owners.is_empty() {
            BudgetTable::default()
        } else {
            BudgetTable::new(self.budget.owners.clone())
        }
    }

    pub fn exclusions(&self) -> ExclusionTable {
        let mut table = ExclusionTable::default();
        if let Some(types) = &self.reporting.excluded_types {
            table.reporting = types.iter().cloned().collect();
        }
        if let Some(types) = &self.budget.excluded_types {
            table.budget = types.iter().cloned().collect();
        }
        table
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_secs(self.sync.debounce_secs)
    }

    pub fn sync_paths(&self) -> SyncPaths {
        let mut paths = SyncPaths::default();
        if let Some(gh) = &self.github {
            if let Some(p) = &gh.campaigns_path {
                paths.campaigns = p.clone();
            }
            if let Some(p) = &gh.budgets_path {
                paths.budgets = p.clone();
            }
        }
        paths
    }

    /// GitHub connection settings with the token taken from the environment.
    pub fn github(&self) -> Result<GitHubConfig, ConfigError> {
        let gh = self.github.as_ref().ok_or(ConfigError::GitHubNotConfigured)?;
        let token = env::var(ENV_GITHUB_TOKEN)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingToken(ENV_GITHUB_TOKEN))?;
        Ok(GitHubConfig {
            api_base: gh.api_base.clone(),
            owner: gh.owner.clone(),
            repo: gh.repo.clone(),
            branch: gh.branch.clone(),
            token: SecretString::from(token),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::CONTRACTOR_INFRASTRUCTURE;
    use crate::types::Region;

    #[test]
    fn empty_file_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.data_dir, PathBuf::from(".campaign_planner"));
        assert_eq!(config.metrics.sql_basis, SqlBasis::Mql);
        assert_eq!(config.budget.order, AllocationOrder::Insertion);
        assert_eq!(config.budget_table(), BudgetTable::default());
        assert!(config.exclusions().excludes_from_reporting(CONTRACTOR_INFRASTRUCTURE));
        assert_eq!(config.debounce(), Duration::from_secs(60));
    }

    #[test]
    fn parses_full_file() {
        let config = AppConfig::from_toml(
            r#"
            data_dir = "/tmp/plans"

            [logging]
            level = "debug"
            format = "json"

            [metrics]
            sql_basis = "leads"

            [budget]
            order = "cost_desc"
            excluded_types = ["User Groups"]

            [[budget.owners]]
            owner = "Pat Doe"
            region = "SAARC"
            assigned_budget = 1000.0

            [reporting]
            excluded_types = []

            [github]
            owner = "acme"
            repo = "plans"
            campaigns_path = "fy25/campaigns.json"

            [sync]
            debounce_secs = 2
            "#,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.metrics.sql_basis, SqlBasis::Leads);
        assert_eq!(config.budget.order, AllocationOrder::CostDesc);
        let table = config.budget_table();
        assert_eq!(table.owners().len(), 1);
        assert_eq!(table.region_for("Pat Doe"), Some(Region::Saarc));
        let ex = config.exclusions();
        assert!(!ex.excludes_from_reporting(CONTRACTOR_INFRASTRUCTURE));
        assert!(ex.excludes_from_budget("user groups"));
        assert_eq!(config.sync_paths().campaigns, "fy25/campaigns.json");
        assert_eq!(config.sync_paths().budgets, "data/budgets.json");
        assert_eq!(config.github.as_ref().unwrap().branch, "main");
        assert_eq!(config.debounce(), Duration::from_secs(2));
    }

    #[test]
    fn rejects_negative_budget() {
        let config = AppConfig::from_toml(
            r#"
            [[budget.owners]]
            owner = "Pat Doe"
            region = "SAARC"
            assigned_budget = -5.0
            "#,
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load(LoadOptions {
            config_path: Some(dir.path().join("absent.toml")),
            require_file: true,
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingConfigFile(_)));
    }

    #[test]
    fn github_requires_a_section() {
        let config = AppConfig::default();
        let err = config.github().unwrap_err();
        assert!(matches!(err, ConfigError::GitHubNotConfigured));
        let planner: crate::error::PlannerError = err.into();
        assert!(planner.to_string().contains("[github]"));
    }
}
