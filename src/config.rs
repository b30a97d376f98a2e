//! Process-wide configuration
//!
//! Read once at startup. Resolution order, lowest to highest priority:
//! built-in defaults, an optional YAML file named by `FILMGRAPH_CONFIG`,
//! then environment variables (a `.env` file in the working directory is
//! loaded into the environment first).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Which graph store transport to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphBackend {
    /// Neo4j Bolt protocol
    Bolt,
    /// Neo4j HTTP transactional API
    Http,
    /// In-process graph, discarded at exit (dry run)
    Memory,
}

impl FromStr for GraphBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bolt" | "neo4j" => Ok(GraphBackend::Bolt),
            "http" | "https" => Ok(GraphBackend::Http),
            "memory" | "embedded" => Ok(GraphBackend::Memory),
            other => Err(format!("unknown graph backend {:?} (expected bolt, http or memory)", other)),
        }
    }
}

/// Document store settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// MongoDB connection string
    pub uri: String,
    /// Database name
    pub database: String,
    /// Collection holding one document per film
    pub collection: String,
    /// Read from a JSON / JSON-lines export instead of MongoDB
    pub file: Option<PathBuf>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".to_string(),
            database: "entertainment".to_string(),
            collection: "films".to_string(),
            file: None,
        }
    }
}

/// Graph store settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub backend: GraphBackend,
    /// `bolt://host:7687` for Bolt, `http://host:7474` for HTTP
    pub uri: String,
    pub username: String,
    pub password: String,
    pub database: String,
    /// Rows fetched per Bolt round trip
    pub fetch_size: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            backend: GraphBackend::Bolt,
            uri: "bolt://localhost:7687".to_string(),
            username: "neo4j".to_string(),
            password: String::new(),
            database: "neo4j".to_string(),
            fetch_size: 200,
        }
    }
}

/// Complete configuration for a migration run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    pub source: SourceConfig,
    pub graph: GraphConfig,
    /// Append failed records here as JSON lines
    pub dead_letter_file: Option<PathBuf>,
}

impl MigrationConfig {
    /// Load `.env`, the optional YAML file, then apply environment overrides
    pub fn load() -> ConfigResult<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("Loaded environment from {:?}", path);
        }

        let base = match std::env::var("FILMGRAPH_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::from_yaml_file(path.trim())?,
            _ => Self::default(),
        };
        base.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply overrides from a variable lookup (the environment in production)
    pub fn with_overrides<F>(mut self, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("MONGODB_URI") {
            self.source.uri = v;
        }
        if let Some(v) = get("DB_NAME") {
            self.source.database = v;
        }
        if let Some(v) = get("DB_COLLECTION") {
            self.source.collection = v;
        }
        if let Some(v) = get("SOURCE_FILE") {
            self.source.file = Some(PathBuf::from(v));
        }
        if let Some(v) = get("NEO4J_URI") {
            self.graph.uri = v;
        }
        if let Some(v) = get("NEO4J_USERNAME") {
            self.graph.username = v;
        }
        if let Some(v) = lookup("NEO4J_PASSWORD") {
            self.graph.password = v;
        }
        if let Some(v) = get("NEO4J_DATABASE") {
            self.graph.database = v;
        }
        if let Some(v) = get("NEO4J_FETCH_SIZE") {
            self.graph.fetch_size = v.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::InvalidValue {
                    key: "NEO4J_FETCH_SIZE",
                    value: v.clone(),
                    reason: e.to_string(),
                }
            })?;
        }
        if let Some(v) = get("GRAPH_BACKEND") {
            self.graph.backend = v.parse().map_err(|reason| ConfigError::InvalidValue {
                key: "GRAPH_BACKEND",
                value: v.clone(),
                reason,
            })?;
        }
        if let Some(v) = get("DEAD_LETTER_FILE") {
            self.dead_letter_file = Some(PathBuf::from(v));
        }
        Ok(self)
    }
}
