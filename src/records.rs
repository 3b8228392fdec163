//! Landing page records.
//!
//! The record store maps an identifier to its metadata: owning agent,
//! tracking values, contact details, status and timestamps. The publisher
//! only depends on the [`RecordStore`] trait; [`JsonRecordStore`] is the
//! bundled implementation, a single JSON file rewritten on every change:
//!
//! ```json
//! {
//!   "version": 1,
//!   "records": [
//!     { "identifier": "promo-2024", "agent": "Lan", "status": "active", ... }
//!   ]
//! }
//! ```
//!
//! Unlike a cache, the file is authoritative: a corrupt or newer-version
//! file is an error, never silently replaced by an empty store.

use crate::fragments::TrackingValues;
use crate::identifier::Identifier;
use crate::status::Status;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::debug;

/// Version of the records file format.
const RECORDS_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("no record for {0}")]
    NotFound(Identifier),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported records file version {found} (expected {})", RECORDS_VERSION)]
    Version { found: u32 },
}

/// Contact details shown on the page by its own scripts; stored, not injected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactDetails {
    pub hotline_phone: String,
    pub zalo_phone: String,
    pub google_form_link: String,
}

/// Optional overrides for [`ContactDetails`]; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactUpdate {
    pub hotline_phone: Option<String>,
    pub zalo_phone: Option<String>,
    pub google_form_link: Option<String>,
}

impl ContactDetails {
    pub fn merged(&self, update: &ContactUpdate) -> Self {
        fn pick(new: &Option<String>, old: &str) -> String {
            new.as_deref().map(str::trim).unwrap_or(old).to_string()
        }
        Self {
            hotline_phone: pick(&update.hotline_phone, &self.hotline_phone),
            zalo_phone: pick(&update.zalo_phone, &self.zalo_phone),
            google_form_link: pick(&update.google_form_link, &self.google_form_link),
        }
    }

    pub fn trimmed(&self) -> Self {
        Self {
            hotline_phone: self.hotline_phone.trim().to_string(),
            zalo_phone: self.zalo_phone.trim().to_string(),
            google_form_link: self.google_form_link.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandingRecord {
    pub identifier: Identifier,
    #[serde(default)]
    pub agent: String,
    #[serde(flatten)]
    pub tracking: TrackingValues,
    #[serde(flatten)]
    pub contact: ContactDetails,
    pub status: Status,
    #[serde(default)]
    pub original_filename: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LandingRecord {
    /// A fresh active record stamped with the current time.
    pub fn new(identifier: Identifier) -> Self {
        let now = Utc::now();
        Self {
            identifier,
            agent: String::new(),
            tracking: TrackingValues::default(),
            contact: ContactDetails::default(),
            status: Status::Active,
            original_filename: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Listing filters. Empty strings count as absent.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Case-insensitive substring of the agent.
    pub agent: Option<String>,
    pub status: Option<Status>,
    /// Case-insensitive substring of the identifier.
    pub query: Option<String>,
}

impl ListFilter {
    pub fn matches(&self, record: &LandingRecord) -> bool {
        fn contains(haystack: &str, needle: &Option<String>) -> bool {
            match needle.as_deref().map(str::trim) {
                Some(n) if !n.is_empty() => haystack.to_lowercase().contains(&n.to_lowercase()),
                _ => true,
            }
        }
        contains(&record.agent, &self.agent)
            && contains(record.identifier.as_str(), &self.query)
            && self.status.is_none_or(|s| s == record.status)
    }
}

/// Persistence for landing page records.
pub trait RecordStore: Send + Sync {
    fn exists(&self, id: &Identifier) -> Result<bool, RecordError>;

    fn get(&self, id: &Identifier) -> Result<LandingRecord, RecordError>;

    /// Insert or replace. Keeps the stored `created_at` of an existing
    /// record and stamps `updated_at`.
    fn upsert(&self, record: LandingRecord) -> Result<(), RecordError>;

    fn set_status(&self, id: &Identifier, status: Status) -> Result<(), RecordError>;

    /// Matching records, newest first.
    fn list(&self, filter: &ListFilter) -> Result<Vec<LandingRecord>, RecordError>;

    fn delete(&self, id: &Identifier) -> Result<(), RecordError>;
}

impl<R: RecordStore + ?Sized> RecordStore for Arc<R> {
    fn exists(&self, id: &Identifier) -> Result<bool, RecordError> {
        (**self).exists(id)
    }

    fn get(&self, id: &Identifier) -> Result<LandingRecord, RecordError> {
        (**self).get(id)
    }

    fn upsert(&self, record: LandingRecord) -> Result<(), RecordError> {
        (**self).upsert(record)
    }

    fn set_status(&self, id: &Identifier, status: Status) -> Result<(), RecordError> {
        (**self).set_status(id, status)
    }

    fn list(&self, filter: &ListFilter) -> Result<Vec<LandingRecord>, RecordError> {
        (**self).list(filter)
    }

    fn delete(&self, id: &Identifier) -> Result<(), RecordError> {
        (**self).delete(id)
    }
}

#[derive(Serialize, Deserialize)]
struct RecordsFile {
    version: u32,
    records: Vec<LandingRecord>,
}

/// Record store backed by one JSON file.
pub struct JsonRecordStore {
    path: PathBuf,
    records: Mutex<BTreeMap<Identifier, LandingRecord>>,
}

impl JsonRecordStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: &Path) -> Result<Self, RecordError> {
        let records: BTreeMap<Identifier, LandingRecord> = match fs::read_to_string(path) {
            Ok(content) => {
                let file: RecordsFile = serde_json::from_str(&content)?;
                if file.version != RECORDS_VERSION {
                    return Err(RecordError::Version {
                        found: file.version,
                    });
                }
                file.records
                    .into_iter()
                    .map(|r| (r.identifier.clone(), r))
                    .collect()
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), count = records.len(), "opened record store");
        Ok(Self {
            path: path.to_path_buf(),
            records: Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `change` to a copy of the records, persist the copy, and only
    /// then make it current.
    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut BTreeMap<Identifier, LandingRecord>) -> Result<T, RecordError>,
    ) -> Result<T, RecordError> {
        let mut current = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = current.clone();
        let out = change(&mut next)?;
        self.save(&next)?;
        *current = next;
        Ok(out)
    }

    fn save(&self, records: &BTreeMap<Identifier, LandingRecord>) -> Result<(), RecordError> {
        let file = RecordsFile {
            version: RECORDS_VERSION,
            records: records.values().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let temp = self.path.with_extension("json.tmp");
        fs::write(&temp, json)?;
        fs::rename(&temp, &self.path)?;
        Ok(())
    }

    fn snapshot(&self) -> BTreeMap<Identifier, LandingRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl RecordStore for JsonRecordStore {
    fn exists(&self, id: &Identifier) -> Result<bool, RecordError> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id))
    }

    fn get(&self, id: &Identifier) -> Result<LandingRecord, RecordError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| RecordError::NotFound(id.clone()))
    }

    fn upsert(&self, mut record: LandingRecord) -> Result<(), RecordError> {
        self.mutate(|records| {
            if let Some(existing) = records.get(&record.identifier) {
                record.created_at = existing.created_at;
            }
            record.updated_at = Utc::now();
            records.insert(record.identifier.clone(), record);
            Ok(())
        })
    }

    fn set_status(&self, id: &Identifier, status: Status) -> Result<(), RecordError> {
        self.mutate(|records| {
            let record = records
                .get_mut(id)
                .ok_or_else(|| RecordError::NotFound(id.clone()))?;
            record.status = status;
            record.updated_at = Utc::now();
            Ok(())
        })
    }

    fn list(&self, filter: &ListFilter) -> Result<Vec<LandingRecord>, RecordError> {
        let mut found: Vec<LandingRecord> = self
            .snapshot()
            .into_values()
            .filter(|r| filter.matches(r))
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    fn delete(&self, id: &Identifier) -> Result<(), RecordError> {
        self.mutate(|records| {
            records
                .remove(id)
                .map(|_| ())
                .ok_or_else(|| RecordError::NotFound(id.clone()))
        })
    }
}
