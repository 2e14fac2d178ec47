//! Server configuration loaded from an optional TOML file.
//!
//! # Responsibility
//! - Parse `[http]`, `[database]`, `[store]` and `[logging]` sections.
//! - Fill every missing key with a working default.
//!
//! # Invariants
//! - A missing config path yields the all-defaults configuration.
//! - A loaded configuration has passed [`ServerConfig::validate`].

use lazyrecord_core::{default_log_level, BackendOptions, LogTarget};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the TOML config file.
pub const CONFIG_PATH_ENV: &str = "LAZYRECORD_CONFIG";

const DEFAULT_LOG_DIR: &str = "logs";

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(toml::de::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "config parse error: {err}"),
            Self::Invalid(message) => write!(f, "config invalid: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
    pub busy_timeout_ms: u64,
    pub acquire_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let backend = BackendOptions::default();
        Self {
            path: "lazyrecord.sqlite3".to_string(),
            pool_size: backend.pool_size,
            busy_timeout_ms: backend.busy_timeout_ms,
            acquire_timeout_ms: backend.acquire_timeout_ms,
        }
    }
}

impl DatabaseConfig {
    pub fn backend_options(&self) -> BackendOptions {
        BackendOptions {
            pool_size: self.pool_size,
            busy_timeout_ms: self.busy_timeout_ms,
            acquire_timeout_ms: self.acquire_timeout_ms,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Per-operation deadline. Unset means operations wait indefinitely on
    /// the backend (bounded only by its own busy/acquire limits).
    pub timeout_ms: Option<u64>,
}

impl StoreConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub dir: Option<String>,
}

impl LoggingConfig {
    pub fn level(&self) -> &str {
        self.level.as_deref().unwrap_or(default_log_level())
    }

    /// Resolves the log directory to an absolute path, relative entries
    /// being taken from the current working directory.
    pub fn target(&self) -> Result<LogTarget, ConfigError> {
        let raw = self.dir.as_deref().unwrap_or(DEFAULT_LOG_DIR);
        let path = Path::new(raw.trim());
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?
                .join(path)
        };
        let absolute = absolute.to_str().ok_or_else(|| {
            ConfigError::Invalid(format!(
                "log dir `{}` is not valid UTF-8",
                absolute.display()
            ))
        })?;
        LogTarget::directory(absolute).map_err(ConfigError::Invalid)
    }
}

impl ServerConfig {
    /// Loads from the file named by `LAZYRECORD_CONFIG`, or defaults when the
    /// variable is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::load(Path::new(&path)),
            None => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.host.trim().is_empty() {
            return Err(ConfigError::Invalid("http.host cannot be empty".to_string()));
        }
        if self.http.port == 0 {
            return Err(ConfigError::Invalid("http.port must be non-zero".to_string()));
        }
        if self.database.path.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "database.path cannot be empty".to_string(),
            ));
        }
        if self.database.pool_size == 0 {
            return Err(ConfigError::Invalid(
                "database.pool_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.http.host, self.http.port)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, ServerConfig};
    use lazyrecord_core::{default_log_level, LogTarget};
    use std::time::Duration;

    #[test]
    fn empty_file_means_defaults() {
        let config = ServerConfig::from_toml_str("").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.bind_address(), "0.0.0.0:8081");
        assert_eq!(config.database.path, "lazyrecord.sqlite3");
        assert_eq!(config.database.backend_options().pool_size, 8);
        assert_eq!(config.store.timeout(), None);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = ServerConfig::from_toml_str(
            r#"
            [http]
            port = 9000

            [database]
            path = "/tmp/records.db"
            busy_timeout_ms = 250

            [store]
            timeout_ms = 1500
            "#,
        )
        .unwrap();

        assert_eq!(config.http.host, "0.0.0.0");
        assert_eq!(config.http.port, 9000);
        assert_eq!(config.database.busy_timeout_ms, 250);
        assert_eq!(config.database.pool_size, 8);
        assert_eq!(config.store.timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn validation_rejects_unusable_values() {
        for raw in [
            "[http]\nport = 0",
            "[database]\npool_size = 0",
            "[database]\npath = \"  \"",
        ] {
            let err = ServerConfig::from_toml_str(raw).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{raw}: {err}");
        }
    }

    #[test]
    fn unknown_keys_and_bad_types_are_parse_errors() {
        assert!(matches!(
            ServerConfig::from_toml_str("[http]\nprot = 1"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            ServerConfig::from_toml_str("[http]\nport = \"eighty\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn log_level_falls_back_to_build_default() {
        let config = ServerConfig::from_toml_str("").unwrap();
        assert_eq!(config.logging.level(), default_log_level());

        let config = ServerConfig::from_toml_str("[logging]\nlevel = \"warn\"").unwrap();
        assert_eq!(config.logging.level(), "warn");
    }

    #[test]
    fn relative_log_dir_resolves_to_absolute() {
        let config = ServerConfig::from_toml_str("[logging]\ndir = \"var/log\"").unwrap();
        match config.logging.target().unwrap() {
            LogTarget::Directory(dir) => {
                assert!(dir.is_absolute());
                assert!(dir.ends_with("var/log"));
            }
            LogTarget::Stderr => panic!("expected a directory target"),
        }
    }
}
