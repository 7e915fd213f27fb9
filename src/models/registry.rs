use crate::error::{DeltaError, Result};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Durable alias -> model path registry
///
/// Persisted as a flat JSON object (alias string -> absolute path string)
/// at `~/.delta/models.json`. Single-user, single-process bookkeeping:
/// concurrent mutating invocations are unsupported and resolve as last
/// writer wins. The registry never checks that a stored path still exists
/// on disk; callers do that at the point of use.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    entries: BTreeMap<String, PathBuf>,
    store_path: PathBuf,
}

impl ModelRegistry {
    /// Open the registry at its well-known location under `~/.delta`
    pub fn open_default() -> Result<Self> {
        Self::load(registry_path()?)
    }

    /// Load the registry from `path`
    ///
    /// A missing file is the first-run condition and yields an empty
    /// registry. A file that exists but does not parse is fatal: a corrupt
    /// store cannot be safely used or silently rebuilt.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let store_path = path.into();

        let content = match fs::read_to_string(&store_path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(Self {
                    entries: BTreeMap::new(),
                    store_path,
                });
            }
            Err(e) => return Err(DeltaError::StoreIo(e)),
        };

        let entries = serde_json::from_str(&content).map_err(|e| DeltaError::StoreCorrupt {
            path: store_path.display().to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            entries,
            store_path,
        })
    }

    /// Persist the full mapping, overwriting previous content
    ///
    /// Writes to a temporary sibling file and renames it into place so a
    /// crash mid-write cannot leave a truncated store behind.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.store_path.parent() {
            fs::create_dir_all(parent).map_err(DeltaError::StoreIo)?;
        }

        let content = serde_json::to_string_pretty(&self.entries).map_err(|e| {
            DeltaError::Config(format!("Failed to serialize registry: {e}"))
        })?;

        let tmp_path = self.store_path.with_extension("tmp");
        fs::write(&tmp_path, content).map_err(DeltaError::StoreIo)?;
        fs::rename(&tmp_path, &self.store_path).map_err(DeltaError::StoreIo)?;

        Ok(())
    }

    /// Associate `alias` with `path` and persist
    ///
    /// Idempotent: if the alias is already registered the existing path is
    /// returned unchanged and nothing is written. First registration wins.
    pub fn register(&mut self, alias: &str, path: impl Into<PathBuf>) -> Result<PathBuf> {
        if let Some(existing) = self.entries.get(alias) {
            tracing::debug!("Alias '{alias}' already registered at {}", existing.display());
            return Ok(existing.clone());
        }

        let path = path.into();
        self.entries.insert(alias.to_string(), path.clone());
        self.save()?;

        Ok(path)
    }

    /// Look up the stored path for `alias`
    pub fn resolve(&self, alias: &str) -> Result<PathBuf> {
        self.entries
            .get(alias)
            .cloned()
            .ok_or_else(|| DeltaError::NotFound(alias.to_string()))
    }

    /// Drop `alias` from the registry and persist
    ///
    /// Bookkeeping only: the model file itself is left on disk.
    pub fn forget(&mut self, alias: &str) -> Result<PathBuf> {
        let path = self
            .entries
            .remove(alias)
            .ok_or_else(|| DeltaError::NotFound(alias.to_string()))?;
        self.save()?;
        Ok(path)
    }

    /// All alias -> path pairs; iteration order is not a contract
    pub fn list_all(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_path()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Delta's home directory (`~/.delta`)
pub fn delta_home() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DeltaError::Config("Could not determine home directory".to_string()))?;
    Ok(home.join(".delta"))
}

/// Directory where pulled model files live (`~/.delta/models`)
pub fn models_dir() -> Result<PathBuf> {
    Ok(delta_home()?.join("models"))
}

/// Registry store path (`~/.delta/models.json`)
pub fn registry_path() -> Result<PathBuf> {
    Ok(delta_home()?.join("models.json"))
}
