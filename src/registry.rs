//! Model registries: where `/v1/models` gets its names from.
//!
//! The registry is consulted on every call. Nothing here caches, so a model that is added or
//! removed shows up on the very next listing.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// A model known to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
}

impl ModelInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("failed to read model registry {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse model registry {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Source of the current, ordered list of models.
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    async fn list_models(&self) -> Result<Vec<ModelInfo>, RegistryError>;
}

/// A fixed list of models.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    models: Vec<ModelInfo>,
}

impl StaticRegistry {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            models: names.into_iter().map(ModelInfo::new).collect(),
        }
    }
}

#[async_trait]
impl ModelRegistry for StaticRegistry {
    async fn list_models(&self) -> Result<Vec<ModelInfo>, RegistryError> {
        Ok(self.models.clone())
    }
}

/// An in-memory registry that the owner can change while the gateway is running, e.g. as models
/// finish downloading.
#[derive(Debug, Clone, Default)]
pub struct SharedRegistry {
    models: Arc<RwLock<Vec<ModelInfo>>>,
}

impl SharedRegistry {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            models: Arc::new(RwLock::new(names.into_iter().map(ModelInfo::new).collect())),
        }
    }

    /// Replace the whole list.
    pub fn set<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let models = names.into_iter().map(ModelInfo::new).collect();
        let mut guard = self.models.write().unwrap_or_else(|e| e.into_inner());
        *guard = models;
    }

    pub fn push(&self, name: impl Into<String>) {
        let mut guard = self.models.write().unwrap_or_else(|e| e.into_inner());
        guard.push(ModelInfo::new(name));
    }

    /// Remove every model called `name`. Returns whether anything was removed.
    pub fn remove(&self, name: &str) -> bool {
        let mut guard = self.models.write().unwrap_or_else(|e| e.into_inner());
        let before = guard.len();
        guard.retain(|m| m.name != name);
        guard.len() != before
    }
}

#[async_trait]
impl ModelRegistry for SharedRegistry {
    async fn list_models(&self) -> Result<Vec<ModelInfo>, RegistryError> {
        Ok(self
            .models
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }
}

/// The accepted on-disk layouts of a models file.
#[derive(Deserialize)]
#[serde(untagged)]
enum ModelsFile {
    Wrapped { models: Vec<ModelEntry> },
    Bare(Vec<ModelEntry>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ModelEntry {
    Name(String),
    Info(ModelInfo),
}

impl From<ModelEntry> for ModelInfo {
    fn from(entry: ModelEntry) -> Self {
        match entry {
            ModelEntry::Name(name) => ModelInfo { name },
            ModelEntry::Info(info) => info,
        }
    }
}

/// A JSON file re-read on every listing.
///
/// The file is either `{"models": [...]}` or a bare array, where each entry is a name or a
/// `{"name": ...}` object.
#[derive(Debug, Clone)]
pub struct FileRegistry {
    path: PathBuf,
}

impl FileRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait]
impl ModelRegistry for FileRegistry {
    async fn list_models(&self) -> Result<Vec<ModelInfo>, RegistryError> {
        let contents =
            tokio::fs::read_to_string(&self.path)
                .await
                .map_err(|source| RegistryError::Read {
                    path: self.path.clone(),
                    source,
                })?;

        let file: ModelsFile =
            serde_json::from_str(&contents).map_err(|source| RegistryError::Parse {
                path: self.path.clone(),
                source,
            })?;

        let entries = match file {
            ModelsFile::Wrapped { models } => models,
            ModelsFile::Bare(models) => models,
        };
        debug!(
            "Read {} models from {}",
            entries.len(),
            self.path.display()
        );
        Ok(entries.into_iter().map(ModelInfo::from).collect())
    }
}
