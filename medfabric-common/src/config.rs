//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration comes from a TOML file. Every section is optional
//! and falls back to built-in defaults, so a missing file is not fatal.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments
//! 2. Environment variables (`MEDFABRIC_ROOT_FOLDER`, `MEDFABRIC_CONFIG`)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "MEDFABRIC_ROOT_FOLDER";

/// Environment variable naming the TOML config file
pub const CONFIG_FILE_ENV: &str = "MEDFABRIC_CONFIG";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "medfabric.db";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database, image data and audit log
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub criterion: CriterionConfig,

    #[serde(default)]
    pub assignment: AssignmentConfig,

    #[serde(default)]
    pub audit: AuditConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            port: default_port(),
            logging: LoggingConfig::default(),
            criterion: CriterionConfig::default(),
            assignment: AssignmentConfig::default(),
            audit: AuditConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Per-field score ceilings, keyed the same way as the `[criterion]` section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CriterionConfig {
    #[serde(rename = "BasalCentral", default = "default_basal_central_max")]
    pub basal_central_max: i64,

    #[serde(rename = "BasalCortex", default = "default_basal_cortex_max")]
    pub basal_cortex_max: i64,

    #[serde(rename = "CoronaRadiata", default = "default_corona_max")]
    pub corona_max: i64,
}

impl Default for CriterionConfig {
    fn default() -> Self {
        Self {
            basal_central_max: default_basal_central_max(),
            basal_cortex_max: default_basal_cortex_max(),
            corona_max: default_corona_max(),
        }
    }
}

/// Task assignment policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentPolicy {
    /// Fewest existing ratings first, one subject per patient
    LeastChosen,
    /// Uniform sample, spot checks only
    Random,
}

impl FromStr for AssignmentPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "least_chosen" | "leastChosen" => Ok(AssignmentPolicy::LeastChosen),
            "random" => Ok(AssignmentPolicy::Random),
            other => Err(Error::InvalidInput(format!(
                "Invalid assignment policy '{}'. Choose 'least_chosen' or 'random'.",
                other
            ))),
        }
    }
}

/// Task scheduler configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AssignmentConfig {
    /// Subjects per batch when the caller does not ask for a count
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_policy")]
    pub default_policy: AssignmentPolicy,

    /// Withhold subjects with unresolved conflicts from least-chosen batches
    #[serde(default)]
    pub skip_conflicted: bool,

    /// Agreeing subject-level verdicts needed before a subject is treated as
    /// truly irrelevant or low quality
    #[serde(default = "default_exclusion_min_agreement")]
    pub exclusion_min_agreement: usize,
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            default_policy: default_policy(),
            skip_conflicted: false,
            exclusion_min_agreement: default_exclusion_min_agreement(),
        }
    }
}

/// Post-commit audit log configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Relative paths are resolved against the root folder
    #[serde(default = "default_audit_file")]
    pub file: PathBuf,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            file: default_audit_file(),
        }
    }
}

fn default_port() -> u16 {
    5740
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_basal_central_max() -> i64 {
    4
}

fn default_basal_cortex_max() -> i64 {
    3
}

fn default_corona_max() -> i64 {
    3
}

fn default_batch_size() -> usize {
    5
}

fn default_policy() -> AssignmentPolicy {
    AssignmentPolicy::LeastChosen
}

fn default_exclusion_min_agreement() -> usize {
    2
}

fn default_true() -> bool {
    true
}

fn default_audit_file() -> PathBuf {
    PathBuf::from("audit.jsonl")
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Load configuration following the priority order
    ///
    /// A missing file yields defaults with a warning. A file that exists but
    /// cannot be parsed is an error.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let path = match resolve_config_path(cli_path) {
            Some(path) => path,
            None => {
                warn!("No config file found, using built-in defaults");
                return Ok(Self::default());
            }
        };

        if !path.exists() {
            warn!("Config file {} not found, using built-in defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}

/// Config file resolution: CLI → environment → platform config dir
fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
        return Some(PathBuf::from(path));
    }

    dirs::config_dir().map(|d| d.join("medfabric").join("config.toml"))
}

/// Root folder resolution
///
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        return PathBuf::from(path);
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    get_default_root_folder()
}

/// Get OS-dependent default root folder path
fn get_default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/medfabric (or /var/lib/medfabric for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("medfabric"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/medfabric"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("medfabric"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/medfabric"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("medfabric"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\medfabric"))
    } else {
        PathBuf::from("./medfabric_data")
    }
}

/// Database path inside a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert_eq!(config.port, 5740);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.criterion, CriterionConfig::default());
        assert_eq!(config.assignment.batch_size, 5);
        assert_eq!(config.assignment.default_policy, AssignmentPolicy::LeastChosen);
        assert!(!config.assignment.skip_conflicted);
        assert!(config.audit.enabled);
    }

    #[test]
    fn test_criterion_section_overrides_ceilings() {
        let config = TomlConfig::from_toml_str(
            r#"
            [criterion]
            BasalCentral = 5
            CoronaRadiata = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.criterion.basal_central_max, 5);
        assert_eq!(config.criterion.basal_cortex_max, 3);
        assert_eq!(config.criterion.corona_max, 2);
    }

    #[test]
    fn test_assignment_section_parses_policy() {
        let config = TomlConfig::from_toml_str(
            r#"
            [assignment]
            batch_size = 10
            default_policy = "random"
            skip_conflicted = true
            "#,
        )
        .unwrap();

        assert_eq!(config.assignment.batch_size, 10);
        assert_eq!(config.assignment.default_policy, AssignmentPolicy::Random);
        assert!(config.assignment.skip_conflicted);
        assert_eq!(config.assignment.exclusion_min_agreement, 2);
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let result = TomlConfig::from_toml_str("port = \"not a number\"");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!(
            "leastChosen".parse::<AssignmentPolicy>().unwrap(),
            AssignmentPolicy::LeastChosen
        );
        assert_eq!("random".parse::<AssignmentPolicy>().unwrap(), AssignmentPolicy::Random);
        assert!("round_robin".parse::<AssignmentPolicy>().is_err());
    }

    #[test]
    fn test_database_path_inside_root() {
        let path = database_path(Path::new("/srv/medfabric"));
        assert_eq!(path, PathBuf::from("/srv/medfabric/medfabric.db"));
    }
}
