//! Configuration file handling.
//!
//! Every key has a default, so a missing file or a missing section is not an error.

use bbaudit_scanner::classifier::{DEFAULT_HOST_MARKER, DEFAULT_HOST_PREFIX};
use bbaudit_scanner::result::DEFAULT_TERM_PATTERN;
use bbaudit_scanner::{AuditError, Classifier, DEFAULT_INSTITUTION, TermCode};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::data::DEFAULT_HTML_NAMING_PATTERN;

pub const DEFAULT_CONFIG_PATH: &str = "~/.config/bbaudit/bbaudit.toml";
pub const DEFAULT_DATABASE_PATH: &str = "~/.config/bbaudit/snapshot.sqlite3";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid LMS host prefix '{value}': {reason}")]
    InvalidHostPrefix { value: String, reason: String },

    #[error("Invalid {field} pattern: {source}")]
    InvalidPattern {
        field: &'static str,
        #[source]
        source: regex::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub reports: ReportsConfig,
    pub institution: InstitutionConfig,
    pub lms: LmsConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite snapshot of the LMS tables.
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_DATABASE_PATH.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportsConfig {
    pub directory: String,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            directory: ".".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstitutionConfig {
    /// Second segment of every course id, e.g. `NAU00` in `1157-NAU00-ENG-105-SEC01`.
    pub code: String,
    pub term_pattern: String,
    pub html_naming_pattern: String,
}

impl Default for InstitutionConfig {
    fn default() -> Self {
        Self {
            code: DEFAULT_INSTITUTION.to_string(),
            term_pattern: DEFAULT_TERM_PATTERN.to_string(),
            html_naming_pattern: DEFAULT_HTML_NAMING_PATTERN.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LmsConfig {
    pub host_prefix: String,
    pub host_marker: String,
}

impl Default for LmsConfig {
    fn default() -> Self {
        Self {
            host_prefix: DEFAULT_HOST_PREFIX.to_string(),
            host_marker: DEFAULT_HOST_MARKER.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Also write logs to this file when set.
    pub file: Option<String>,
}

/// Expands a leading `~` to the user's home directory.
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

impl Config {
    /// Loads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;

        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(path, content).map_err(write_err)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let invalid_host = |reason: String| ConfigError::InvalidHostPrefix {
            value: self.lms.host_prefix.clone(),
            reason,
        };

        let url = Url::parse(&self.lms.host_prefix).map_err(|e| invalid_host(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid_host(format!("unsupported scheme '{}'", url.scheme())));
        }
        if !self.lms.host_prefix.ends_with('/') {
            return Err(invalid_host("must end with '/'".to_string()));
        }

        self.term_regex()?;
        Regex::new(&self.institution.html_naming_pattern).map_err(|source| {
            ConfigError::InvalidPattern {
                field: "HTML naming",
                source,
            }
        })?;

        Ok(())
    }

    /// The configured term pattern, anchored so it must match the whole code.
    pub fn term_regex(&self) -> Result<Regex> {
        let anchored = format!("^(?:{})$", self.institution.term_pattern);
        Regex::new(&anchored).map_err(|source| ConfigError::InvalidPattern {
            field: "term",
            source,
        })
    }

    /// Validates a user-supplied term code against the configured pattern.
    pub fn parse_term(&self, input: &str) -> bbaudit_scanner::Result<TermCode> {
        let pattern = self
            .term_regex()
            .map_err(|e| AuditError::Other(e.to_string()))?;
        TermCode::parse_with(input, &pattern)
    }

    pub fn classifier(&self) -> Classifier {
        Classifier::new(&self.lms.host_prefix, &self.lms.host_marker)
    }

    pub fn database_path(&self) -> PathBuf {
        expand_path(&self.database.path)
    }

    pub fn reports_dir(&self) -> PathBuf {
        expand_path(&self.reports.directory)
    }

    pub fn log_file(&self) -> Option<PathBuf> {
        self.log.file.as_deref().map(expand_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.institution.code, "NAU00");
        assert_eq!(config.lms.host_prefix, "https://bblearn.nau.edu/");
        assert_eq!(config.lms.host_marker, "bblearn");
        assert!(config.log.file.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [institution]
            code = "FLG01"
            "#,
        )
        .unwrap();

        assert_eq!(config.institution.code, "FLG01");
        assert_eq!(config.institution.term_pattern, DEFAULT_TERM_PATTERN);
        assert_eq!(config.database.path, DEFAULT_DATABASE_PATH);
    }

    #[test]
    fn test_rejects_bad_host_prefix() {
        let mut config = Config::default();
        config.lms.host_prefix = "not a url".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidHostPrefix { .. })
        ));

        config.lms.host_prefix = "ftp://bblearn.nau.edu/".to_string();
        assert!(config.validate().is_err());

        config.lms.host_prefix = "https://bblearn.nau.edu".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_term_pattern() {
        let mut config = Config::default();
        config.institution.term_pattern = "([".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPattern { field: "term", .. })
        ));
    }

    #[test]
    fn test_parse_term() {
        let config = Config::default();
        assert_eq!(config.parse_term("1157").unwrap(), TermCode::new(1157));
        assert!(config.parse_term("2157").is_err());
        assert!(config.parse_term("abc").is_err());
    }

    #[test]
    fn test_unanchored_term_pattern_matches_whole_code() {
        let mut config = Config::default();
        config.institution.term_pattern = "1[0-9]{2}[1478]".to_string();

        assert!(config.parse_term("1157").is_ok());
        assert!(config.parse_term("911571").is_err());
        assert!(config.parse_term("11571").is_err());
    }

    #[test]
    fn test_expand_path_leaves_plain_paths_alone() {
        assert_eq!(expand_path("/tmp/x.db"), PathBuf::from("/tmp/x.db"));
    }
}
