//! Mirror catalog access
//!
//! The catalog is a key-value store mapping `mirrors/<repo>` to a JSON list
//! of [`Mirror`] records. It is opened once at startup and shared read-only
//! by every request.

use crate::config::{CatalogBackend, CatalogConfig};
use crate::error::{MetalinkError, Result};
use crate::models::{Mirror, Protocol};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

/// Key under which the mirror list of `repo` is stored
pub fn mirrors_key(repo: &str) -> String {
    format!("mirrors/{}", repo)
}

/// Read-only key-value store holding mirror lists
#[async_trait]
pub trait MirrorCatalog: Send + Sync {
    /// Get the raw value stored under `key`
    ///
    /// Returns `Ok(None)` when the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<String>>;
}

/// Load the mirror list of `repo`
///
/// A missing key and an empty list both mean the repository has no mirrors
/// and yield [`MetalinkError::NotFound`].
pub async fn load_mirrors(catalog: &dyn MirrorCatalog, repo: &str) -> Result<Vec<Mirror>> {
    let key = mirrors_key(repo);
    let raw = catalog.get(&key).await?.ok_or_else(|| {
        debug!("No catalog entry for key={}", key);
        MetalinkError::no_mirrors()
    })?;

    let mut mirrors: Vec<Mirror> = serde_json::from_str(&raw).map_err(|e| {
        warn!("Malformed catalog entry for key={}: {}", key, e);
        MetalinkError::CatalogError(format!("Malformed mirror list for {}: {}", repo, e))
    })?;

    for mirror in &mut mirrors {
        if mirror.protocols.is_empty() {
            warn!("Mirror {} in key={} lists no protocols", mirror.url, key);
            return Err(MetalinkError::CatalogError(format!(
                "Mirror {} of {} lists no protocols",
                mirror.url, repo
            )));
        }
        dedup_protocols(&mut mirror.protocols);
    }

    if mirrors.is_empty() {
        debug!("Catalog entry for key={} is empty", key);
        return Err(MetalinkError::no_mirrors());
    }

    debug!("Loaded {} mirrors for repo={}", mirrors.len(), repo);
    Ok(mirrors)
}

/// Drop repeated protocols, keeping the first occurrence of each
fn dedup_protocols(protocols: &mut Vec<Protocol>) {
    let mut seen = Vec::with_capacity(protocols.len());
    protocols.retain(|protocol| {
        if seen.contains(protocol) {
            false
        } else {
            seen.push(*protocol);
            true
        }
    });
}

/// In-memory catalog
#[derive(Debug, Default, Clone)]
pub struct MemoryCatalog {
    entries: HashMap<String, String>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: HashMap<String, String>) -> Self {
        MemoryCatalog { entries }
    }

    /// Store a raw value under `key`
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Store the mirror list of `repo`
    pub fn insert_mirrors(&mut self, repo: &str, mirrors: &[Mirror]) -> Result<()> {
        let value = serde_json::to_string(mirrors).map_err(|e| {
            MetalinkError::CatalogError(format!("Failed to encode mirror list: {}", e))
        })?;
        self.insert(mirrors_key(repo), value);
        Ok(())
    }
}

#[async_trait]
impl MirrorCatalog for MemoryCatalog {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }
}

/// Catalog stored on disk, one `<key>.json` file per key
#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    root: PathBuf,
}

impl DirectoryCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectoryCatalog { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        // Keys are repository names behind a fixed prefix; refuse anything that
        // could step outside the root.
        if key.is_empty()
            || key.starts_with('/')
            || key.split('/').any(|part| part.is_empty() || part == "." || part == "..")
        {
            return Err(MetalinkError::CatalogError(format!("Invalid catalog key: {}", key)));
        }
        Ok(self.root.join(format!("{}.json", key)))
    }
}

#[async_trait]
impl MirrorCatalog for DirectoryCatalog {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                warn!("Failed to read catalog file {:?}: {}", path, e);
                Err(MetalinkError::CatalogError(format!(
                    "Failed to read catalog entry {}: {}",
                    key, e
                )))
            }
        }
    }
}

/// Open the catalog described by `config`
pub fn open_catalog(config: &CatalogConfig) -> Result<Arc<dyn MirrorCatalog>> {
    match config.backend {
        CatalogBackend::Memory => {
            info!("Using in-memory catalog with {} entries", config.entries.len());
            Ok(Arc::new(MemoryCatalog::from_entries(config.entries.clone())))
        }
        CatalogBackend::Directory => {
            let path = config.path.as_deref().ok_or_else(|| {
                MetalinkError::ConfigError(
                    "catalog.path is required when catalog.backend is 'directory'".to_string(),
                )
            })?;
            info!("Using directory catalog at {}", path);
            Ok(Arc::new(DirectoryCatalog::new(path)))
        }
    }
}
