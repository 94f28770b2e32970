//! Session configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::overrides::CatalogOverrides;

pub const DEFAULT_DATABASE: &str = ":memory:";
pub const DEFAULT_PROJECT: &str = "authproj";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// SQLite database path, or `:memory:`
    pub database: String,

    /// Project used for table references that do not name one
    pub project: String,

    /// Datasets reported by the catalog, as `project.dataset`
    pub datasets: Vec<String>,

    pub overrides: CatalogOverrides,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            database: DEFAULT_DATABASE.to_string(),
            project: DEFAULT_PROJECT.to_string(),
            datasets: vec![
                "myproject.mydataset".to_string(),
                "myproject.yourdataset".to_string(),
            ],
            overrides: CatalogOverrides::default(),
        }
    }
}

impl SessionConfig {
    /// Defaults, with `BQLITE_DATABASE` and `BQLITE_PROJECT` applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(database) = std::env::var("BQLITE_DATABASE") {
            config.database = database;
        }
        if let Ok(project) = std::env::var("BQLITE_PROJECT") {
            config.project = project;
        }
        config
    }

    /// Load a JSON config file. Missing keys take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    pub fn with_overrides(mut self, overrides: CatalogOverrides) -> Self {
        self.overrides = overrides;
        self
    }
}
