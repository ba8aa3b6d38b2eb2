//! Server configuration from environment variables.
//!
//! - `WRITETHRU_PORT`: listen port (default: 3000)
//! - `WRITETHRU_READ_ONLY`: `true`/`1` opens the store read-only (default: false)
//! - `WRITETHRU_TARGETS`: comma-separated backend targets, each
//!   `memory:<name>` or `sqlite:<path>` (default: none)

use std::sync::Arc;

use writethru_storage::{MemoryTarget, SqliteTarget, StorageError, StorageTarget};

pub const DEFAULT_PORT: u16 = 3000;

/// Errors from reading configuration or opening configured targets.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },

    #[error("invalid target {0:?}: expected memory:<name> or sqlite:<path>")]
    InvalidTarget(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// One backend target to attach at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetConfig {
    Memory { name: String },
    Sqlite { path: String },
}

impl TargetConfig {
    /// Parses `memory:<name>` or `sqlite:<path>`.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidTarget(text.to_string());
        let (kind, rest) = text.trim().split_once(':').ok_or_else(invalid)?;
        if rest.is_empty() {
            return Err(invalid());
        }
        match kind {
            "memory" => Ok(TargetConfig::Memory {
                name: rest.to_string(),
            }),
            "sqlite" => Ok(TargetConfig::Sqlite {
                path: rest.to_string(),
            }),
            _ => Err(invalid()),
        }
    }

    /// The `StorageNode` name the target is attached under.
    pub fn name(&self) -> &str {
        match self {
            TargetConfig::Memory { name } => name.as_str(),
            TargetConfig::Sqlite { path } => path.as_str(),
        }
    }

    /// Opens the target.
    pub fn open(&self) -> Result<Arc<dyn StorageTarget>, ConfigError> {
        let target: Arc<dyn StorageTarget> = match self {
            TargetConfig::Memory { name } => Arc::new(MemoryTarget::new(name.clone())),
            TargetConfig::Sqlite { path } => Arc::new(SqliteTarget::open(path)?),
        };
        Ok(target)
    }
}

/// Startup configuration for the HTTP host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub read_only: bool,
    pub targets: Vec<TargetConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: DEFAULT_PORT,
            read_only: false,
            targets: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds a config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = ServerConfig::default();

        if let Some(port) = lookup("WRITETHRU_PORT") {
            config.port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                var: "WRITETHRU_PORT",
                value: port.clone(),
            })?;
        }

        if let Some(flag) = lookup("WRITETHRU_READ_ONLY") {
            config.read_only = match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "" | "0" | "false" | "no" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        var: "WRITETHRU_READ_ONLY",
                        value: flag,
                    })
                }
            };
        }

        if let Some(targets) = lookup("WRITETHRU_TARGETS") {
            config.targets = targets
                .split(',')
                .filter(|entry| !entry.trim().is_empty())
                .map(TargetConfig::parse)
                .collect::<Result<_, _>>()?;
        }

        Ok(config)
    }
}
