//! Environment-driven core configuration.
//!
//! # Responsibility
//! - Collect log, storage and audit-cap settings in one struct.
//!
//! # Invariants
//! - Unset or blank variables fall back to defaults.
//! - Malformed numbers are errors, never silently defaulted.

use crate::logging::default_log_level;
use crate::model::audit::AuditLimits;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const ENV_LOG_LEVEL: &str = "CANVAS_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "CANVAS_LOG_DIR";
pub const ENV_DB_PATH: &str = "CANVAS_DB_PATH";
pub const ENV_AUDIT_MAX_CHANGES: &str = "CANVAS_AUDIT_MAX_CHANGES";
pub const ENV_AUDIT_MAX_TYPE_CHANGES: &str = "CANVAS_AUDIT_MAX_TYPE_CHANGES";

const DEFAULT_DB_PATH: &str = "canvas.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidNumber { var: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNumber { var, value } => {
                write!(f, "{var} must be a positive integer, got `{value}`")
            }
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub log_level: String,
    /// `None` disables file logging.
    pub log_dir: Option<String>,
    pub db_path: PathBuf,
    pub audit_limits: AuditLimits,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level().to_string(),
            log_dir: None,
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            audit_limits: AuditLimits::default(),
        }
    }
}

impl CoreConfig {
    /// Reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds config from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |var: &str| {
            lookup(var)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();
        let defaults_limits = defaults.audit_limits;

        Ok(Self {
            log_level: read(ENV_LOG_LEVEL).unwrap_or(defaults.log_level),
            log_dir: read(ENV_LOG_DIR),
            db_path: read(ENV_DB_PATH).map_or(defaults.db_path, PathBuf::from),
            audit_limits: AuditLimits {
                max_changes: parse_cap(
                    ENV_AUDIT_MAX_CHANGES,
                    read(ENV_AUDIT_MAX_CHANGES),
                    defaults_limits.max_changes,
                )?,
                max_type_changes: parse_cap(
                    ENV_AUDIT_MAX_TYPE_CHANGES,
                    read(ENV_AUDIT_MAX_TYPE_CHANGES),
                    defaults_limits.max_type_changes,
                )?,
            },
        })
    }
}

fn parse_cap(var: &'static str, value: Option<String>, default: usize) -> Result<usize, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.parse::<usize>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(ConfigError::InvalidNumber { var, value }),
    }
}
