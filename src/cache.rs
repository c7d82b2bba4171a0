//! Local cache of the override catalog.
//!
//! The configuration editor writes here first, so an operator's edits
//! survive even when the shared database cannot be written.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::WorkflowCatalog;
use crate::error::StoreError;
use crate::store::RecordStore;
use crate::task::FormulaSteps;

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    saved_at_utc: i64,
    formulas: Vec<FormulaSteps>,
}

/// JSON file holding the last saved override catalog.
#[derive(Debug, Clone)]
pub struct CatalogCache {
    path: PathBuf,
}

impl CatalogCache {
    pub fn new(path: &Path) -> Self {
        CatalogCache { path: path.to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached overrides, or `None` when nothing was saved yet.
    pub fn load(&self) -> Result<Option<Vec<FormulaSteps>>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let mut buf = String::new();
        File::open(&self.path)?.read_to_string(&mut buf)?;
        let cache: CacheFile = serde_json::from_str(&buf)?;
        debug!(path = %self.path.display(), formulas = cache.formulas.len(), "Loaded catalog cache");
        Ok(Some(cache.formulas))
    }

    /// Replace the cached overrides (temp file + rename). The parent
    /// directory must already exist.
    pub fn store(&self, formulas: &[FormulaSteps]) -> Result<(), StoreError> {
        let cache = CacheFile { saved_at_utc: chrono::Utc::now().timestamp(), formulas: formulas.to_vec() };
        let tmp = self.path.with_extension("json.tmp");
        let mut f = File::create(&tmp)?;
        f.write_all(serde_json::to_string_pretty(&cache)?.as_bytes())?;
        f.flush()?;
        fs::rename(tmp, &self.path)?;
        Ok(())
    }
}

/// Catalog in effect at startup.
///
/// The store's override catalog wins when it can be read and is not empty;
/// the local cache is then refreshed from it. Otherwise the cache is used,
/// and with no cache either the built-in defaults apply.
pub fn load_catalog<S: RecordStore + ?Sized>(store: &S, cache: &CatalogCache) -> WorkflowCatalog {
    match store.override_catalog() {
        Ok(remote) if !remote.is_empty() => {
            if let Err(e) = cache.store(&remote) {
                warn!(path = %cache.path().display(), error = %e, "Could not refresh catalog cache");
            }
            return WorkflowCatalog::with_overrides(remote);
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "Override catalog unavailable, trying local cache"),
    }

    match cache.load() {
        Ok(Some(local)) => WorkflowCatalog::with_overrides(local),
        Ok(None) => WorkflowCatalog::new(),
        Err(e) => {
            warn!(path = %cache.path().display(), error = %e, "Unreadable catalog cache, using defaults");
            WorkflowCatalog::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::fields::Pole;
    use crate::task::TaskTemplate;

    #[test]
    fn test_missing_cache_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CatalogCache::new(&dir.path().join("catalog.json"));
        assert!(cache.load().unwrap().is_none());
    }

    #[test]
    fn test_store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CatalogCache::new(&dir.path().join("catalog.json"));
        let payload = vec![FormulaSteps {
            formula: "Elopement".into(),
            steps: vec![TaskTemplate::new("e-1", "Quick gallery", 7, "Photo editor", Pole::Photo)],
        }];
        cache.store(&payload).unwrap();
        assert_eq!(cache.load().unwrap(), Some(payload));
    }

    #[test]
    fn test_store_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CatalogCache::new(&dir.path().join("nope").join("catalog.json"));
        assert!(matches!(cache.store(&[]), Err(StoreError::Io(_))));
    }

    fn elopement() -> Vec<FormulaSteps> {
        vec![FormulaSteps {
            formula: "Elopement".into(),
            steps: vec![TaskTemplate::new("e-1", "Quick gallery", 7, "Photo editor", Pole::Photo)],
        }]
    }

    #[test]
    fn test_load_catalog_prefers_store_and_refreshes_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CatalogCache::new(&dir.path().join("catalog.json"));
        let mut db = Database::in_memory();
        db.upsert_override_catalog(&elopement()).unwrap();

        let catalog = load_catalog(&db, &cache);
        assert!(catalog.has_override("Elopement"));
        assert_eq!(cache.load().unwrap(), Some(elopement()));
    }

    #[test]
    fn test_load_catalog_falls_back_to_cache_then_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CatalogCache::new(&dir.path().join("catalog.json"));
        let db = Database::in_memory();
        assert_eq!(load_catalog(&db, &cache), WorkflowCatalog::new());

        cache.store(&elopement()).unwrap();
        assert!(load_catalog(&db, &cache).has_override("Elopement"));

        std::fs::write(cache.path(), "garbage").unwrap();
        assert_eq!(load_catalog(&db, &cache), WorkflowCatalog::new());
    }
}
