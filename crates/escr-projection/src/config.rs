use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use escr_graph::TableNames;

use crate::error::{ProjectionError, ProjectionResult};

/// Configuration of one content graph projection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    /// SQLite file holding the projected graph.
    pub database_path: PathBuf,
    /// Identifies the content repository; all tables share its prefix.
    pub content_repository_id: String,
    /// Whether catch-up runs register the cache-flushing hook.
    pub cache_flushing: bool,
    /// Number of events between `on_before_batch_completed` hook calls.
    pub batch_size: usize,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("content-graph.sqlite3"),
            content_repository_id: "default".into(),
            cache_flushing: true,
            batch_size: 100,
        }
    }
}

impl ProjectionConfig {
    /// Read a TOML file. Missing keys take their default values.
    pub fn load(path: &Path) -> ProjectionResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&raw)?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> ProjectionResult<Self> {
        let config: Self = toml::from_str(raw).map_err(|e| ProjectionError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> ProjectionResult<String> {
        toml::to_string_pretty(self).map_err(|e| ProjectionError::Config(e.to_string()))
    }

    pub fn validate(&self) -> ProjectionResult<()> {
        let id = &self.content_repository_id;
        if id.is_empty()
            || !id
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
        {
            return Err(ProjectionError::Config(format!(
                "content repository id \"{id}\" must match [a-z0-9_]+"
            )));
        }
        if self.batch_size == 0 {
            return Err(ProjectionError::Config("batch size must be positive".into()));
        }
        Ok(())
    }

    pub fn table_names(&self) -> TableNames {
        TableNames::for_content_repository(&self.content_repository_id)
    }
}
