//! On-disk publications.
//!
//! Every landing page lives in its own directory under the published root:
//!
//! ```text
//! published/
//! └── promo-2024/
//!     ├── index.html          # Active document, always present
//!     ├── index.paused.html   # Preserved original, only while paused
//!     ├── anh1.jpg            # Secondary assets
//!     └── anh2.png
//! ```
//!
//! # Pause and resume
//!
//! Pausing renames `index.html` to `index.paused.html` in one filesystem
//! operation and then writes the placeholder to `index.html`. If the process
//! dies between the two steps the directory holds a paused document and no
//! active one. That state is never repaired by reactivating: the next
//! [`Publication::pause`] or [`PublicationStore::recover`] writes the missing
//! placeholder.
//!
//! Resuming renames `index.paused.html` over the placeholder, which replaces
//! it atomically. Writes made while paused only ever touch `index.html`, so
//! resuming replaces them with the document preserved at pause time.
//!
//! Documents are written to a hidden temporary sibling first and renamed
//! into place, so readers never observe a half-written page.
//!
//! # Locking
//!
//! All mutation happens through a [`Publication`] handle, and the only way to
//! obtain one is [`PublicationStore::with_publication`], which holds a
//! per-identifier mutex for the duration of the closure. Different
//! identifiers never contend, and a mutex lives only while some caller holds
//! or waits on it. The mutex is not reentrant: do not call the store-level
//! convenience methods from inside the closure.

use crate::config::{AssetsConfig, PressConfig};
use crate::identifier::Identifier;
use crate::pages;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info, warn};

/// The document served to visitors.
pub const ACTIVE_FILENAME: &str = "index.html";
/// The original document held aside while paused.
pub const PAUSED_FILENAME: &str = "index.paused.html";

const TEMP_SUFFIX: &str = ".tmp";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("publication not found: {0}")]
    NotFound(String),
    #[error("asset path not allowed: {0}")]
    InvalidAssetPath(String),
    #[error("storage failure at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn io_at(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Outcome of a pause or resume request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The directory moved to the requested state.
    Applied,
    /// The directory was already in the requested state.
    Unchanged,
    /// A half-paused directory got its missing placeholder.
    Repaired,
}

/// A secondary file uploaded alongside the page.
#[derive(Debug, Clone)]
pub struct Asset {
    /// Name as uploaded; only its extension is kept.
    pub original_name: String,
    pub content: Vec<u8>,
}

pub struct PublicationStore {
    root: PathBuf,
    placeholder: String,
    assets: AssetsConfig,
    /// One mutex per identifier with an operation in flight; entries are
    /// dropped once the last user releases them.
    locks: Mutex<HashMap<Identifier, Arc<Mutex<()>>>>,
}

impl PublicationStore {
    pub fn new(config: &PressConfig) -> Self {
        Self {
            root: config.published_root.clone(),
            placeholder: pages::paused_page(&config.paused),
            assets: config.assets.clone(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run `f` with exclusive access to the publication named `id`.
    pub fn with_publication<T, E>(
        &self,
        id: &Identifier,
        f: impl FnOnce(&Publication<'_>) -> Result<T, E>,
    ) -> Result<T, E> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(id.clone()).or_default())
        };
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f(&Publication {
                store: self,
                id,
                dir: self.root.join(id.as_str()),
            })
        };

        // Clones are only handed out under the map lock, so a count of two
        // (map + ours) means nobody else holds or waits on this mutex.
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if Arc::strong_count(&lock) == 2 {
            locks.remove(id);
        }
        result
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn write(&self, id: &Identifier, content: &str) -> Result<(), StoreError> {
        self.with_publication(id, |p| p.write(content))
    }

    pub fn read_active(&self, id: &Identifier) -> Result<String, StoreError> {
        self.with_publication(id, |p| p.read_active())
    }

    pub fn pause(&self, id: &Identifier) -> Result<Transition, StoreError> {
        self.with_publication(id, |p| p.pause())
    }

    pub fn resume(&self, id: &Identifier) -> Result<Transition, StoreError> {
        self.with_publication(id, |p| p.resume())
    }

    /// Resolve `relative` to a secondary asset of `id`.
    ///
    /// Rejects anything that could leave the publication directory, hidden
    /// files, and the paused document. Missing files are `NotFound`.
    pub fn asset_path(&self, id: &Identifier, relative: &str) -> Result<PathBuf, StoreError> {
        let rel = Path::new(relative);
        let mut normal = Vec::new();
        for component in rel.components() {
            match component {
                Component::Normal(part) => normal.push(part),
                Component::CurDir => {}
                _ => return Err(StoreError::InvalidAssetPath(relative.to_string())),
            }
        }
        let hidden = normal
            .iter()
            .any(|part| part.to_string_lossy().starts_with('.'));
        let is_paused_doc = normal.len() == 1 && normal[0] == PAUSED_FILENAME;
        if normal.is_empty() || hidden || is_paused_doc {
            return Err(StoreError::InvalidAssetPath(relative.to_string()));
        }

        let path = normal
            .iter()
            .fold(self.root.join(id.as_str()), |acc, part| acc.join(part));
        if !path.is_file() {
            return Err(StoreError::NotFound(format!("{id}/{relative}")));
        }
        Ok(path)
    }

    /// Repair every half-paused publication under the root and clear out
    /// temporary files left by interrupted writes.
    ///
    /// Returns the identifiers that received a placeholder.
    pub fn recover(&self) -> Result<Vec<Identifier>, StoreError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_at(&self.root)(e)),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(io_at(&self.root))?;
            let name = entry.file_name().to_string_lossy().to_string();
            match Identifier::normalize(&name) {
                Ok(id) if id.as_str() == name && entry.path().is_dir() => ids.push(id),
                _ => debug!(entry = %name, "skipping non-publication entry"),
            }
        }
        ids.sort();

        let mut repaired = Vec::new();
        for id in ids {
            let fixed = self.with_publication(&id, |p| {
                p.remove_temp_files()?;
                p.repair()
            })?;
            if fixed {
                repaired.push(id);
            }
        }
        info!(repaired = repaired.len(), "recovery scan finished");
        Ok(repaired)
    }
}

/// Exclusive handle on one publication directory.
pub struct Publication<'a> {
    store: &'a PublicationStore,
    id: &'a Identifier,
    dir: PathBuf,
}

impl Publication<'_> {
    pub fn identifier(&self) -> &Identifier {
        self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn active_path(&self) -> PathBuf {
        self.dir.join(ACTIVE_FILENAME)
    }

    fn paused_path(&self) -> PathBuf {
        self.dir.join(PAUSED_FILENAME)
    }

    fn not_found(&self) -> StoreError {
        StoreError::NotFound(self.id.to_string())
    }

    pub fn is_paused(&self) -> Result<bool, StoreError> {
        present(&self.paused_path())
    }

    /// Whether either document exists.
    pub fn exists(&self) -> Result<bool, StoreError> {
        Ok(present(&self.active_path())? || present(&self.paused_path())?)
    }

    /// Store `content` as the active document.
    ///
    /// A preserved document from an earlier pause is left untouched, so a
    /// later resume still brings back the page as it was when paused.
    pub fn write(&self, content: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(io_at(&self.dir))?;
        write_atomic(&self.active_path(), content.as_bytes())?;
        debug!(id = %self.id, bytes = content.len(), "wrote active document");
        Ok(())
    }

    /// The document currently served to visitors: exactly what the last
    /// [`write`](Self::write) stored, or the placeholder after a pause.
    pub fn read_active(&self) -> Result<String, StoreError> {
        self.read(&self.active_path())
    }

    fn read(&self, path: &Path) -> Result<String, StoreError> {
        match fs::read(path) {
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(self.not_found()),
            Err(e) => Err(io_at(path)(e)),
        }
    }

    pub fn pause(&self) -> Result<Transition, StoreError> {
        let active = self.active_path();
        let paused = self.paused_path();

        if present(&paused)? {
            if self.repair()? {
                return Ok(Transition::Repaired);
            }
            debug!(id = %self.id, "already paused");
            return Ok(Transition::Unchanged);
        }
        if !present(&active)? {
            return Err(self.not_found());
        }

        fs::rename(&active, &paused).map_err(io_at(&paused))?;
        write_atomic(&active, self.store.placeholder.as_bytes())?;
        info!(id = %self.id, "paused");
        Ok(Transition::Applied)
    }

    pub fn resume(&self) -> Result<Transition, StoreError> {
        let paused = self.paused_path();
        if !present(&paused)? {
            debug!(id = %self.id, "not paused");
            return Ok(Transition::Unchanged);
        }
        let active = self.active_path();
        fs::rename(&paused, &active).map_err(io_at(&active))?;
        info!(id = %self.id, "resumed");
        Ok(Transition::Applied)
    }

    /// Write the placeholder if the directory is paused but has no active
    /// document. Returns whether anything was written.
    fn repair(&self) -> Result<bool, StoreError> {
        let active = self.active_path();
        if present(&self.paused_path())? && !present(&active)? {
            warn!(id = %self.id, "paused document without placeholder, rewriting placeholder");
            write_atomic(&active, self.store.placeholder.as_bytes())?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Save `assets` as `{prefix}1.ext`, `{prefix}2.ext`, ... and return the
    /// stored names in upload order.
    pub fn save_assets(&self, assets: &[Asset]) -> Result<Vec<String>, StoreError> {
        if assets.is_empty() {
            return Ok(Vec::new());
        }
        fs::create_dir_all(&self.dir).map_err(io_at(&self.dir))?;
        let config = &self.store.assets;
        let mut saved = Vec::with_capacity(assets.len());
        for (index, asset) in assets.iter().enumerate() {
            let name = asset_filename(config, index + 1, &asset.original_name);
            write_atomic(&self.dir.join(&name), &asset.content)?;
            debug!(id = %self.id, asset = %name, bytes = asset.content.len(), "saved asset");
            saved.push(name);
        }
        Ok(saved)
    }

    /// Delete the whole publication directory.
    pub fn remove(&self) -> Result<(), StoreError> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => {
                info!(id = %self.id, "removed publication directory");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(self.not_found()),
            Err(e) => Err(io_at(&self.dir)(e)),
        }
    }

    fn remove_temp_files(&self) -> Result<(), StoreError> {
        for entry in fs::read_dir(&self.dir).map_err(io_at(&self.dir))? {
            let entry = entry.map_err(io_at(&self.dir))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') && name.ends_with(TEMP_SUFFIX) {
                let path = entry.path();
                fs::remove_file(&path).map_err(io_at(&path))?;
                debug!(id = %self.id, file = %name, "removed stale temporary file");
            }
        }
        Ok(())
    }
}

/// `anh3.png` for the third upload named `Photo.PNG`.
fn asset_filename(config: &AssetsConfig, number: usize, original_name: &str) -> String {
    let ext: String = Path::new(original_name)
        .extension()
        .map(|e| {
            e.to_string_lossy()
                .chars()
                .filter(char::is_ascii_alphanumeric)
                .collect::<String>()
                .to_ascii_lowercase()
        })
        .unwrap_or_default();
    let ext = if ext.is_empty() {
        config.default_extension.as_str()
    } else {
        ext.as_str()
    };
    format!("{}{}.{}", config.prefix, number, ext)
}

fn present(path: &Path) -> Result<bool, StoreError> {
    path.try_exists().map_err(io_at(path))
}

/// Write `content` next to `path` under a hidden name, then rename it over
/// `path`.
fn write_atomic(path: &Path, content: &[u8]) -> Result<(), StoreError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(".{file_name}{TEMP_SUFFIX}"));
    fs::write(&temp, content).map_err(io_at(&temp))?;
    if let Err(e) = fs::rename(&temp, path) {
        if let Err(cleanup) = fs::remove_file(&temp) {
            warn!(file = %temp.display(), error = %cleanup, "could not remove temporary file");
        }
        return Err(io_at(path)(e));
    }
    Ok(())
}
