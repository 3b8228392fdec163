//! The publish pipeline.
//!
//! [`Publisher`] ties the pieces together for every operator action:
//!
//! ```text
//! create:  normalize id → reject duplicate → build fragments → inject
//!          → write document + assets → save record
//! update:  load record → merge values → (new source | stored source)
//!          → inject → write document + assets → save record
//! ```
//!
//! Every action on one identifier runs under that identifier's store lock,
//! so two edits, or an edit and a pause, never interleave. Validation
//! (identifier, status, asset count) happens before anything is written.
//!
//! Files are written before the record. If the record cannot be saved
//! afterwards the call fails with [`PublishError::PartialSuccess`]: the page
//! is on disk and [`Publisher::register`] (or repeating the call) completes
//! it without uploading again.

use crate::config::{AssetsConfig, PressConfig};
use crate::fragments::{TrackingUpdate, TrackingValues, body_fragment, head_fragment};
use crate::identifier::{Identifier, InvalidIdentifier};
use crate::inject;
use crate::pages;
use crate::records::{
    ContactDetails, ContactUpdate, JsonRecordStore, LandingRecord, ListFilter, RecordError,
    RecordStore,
};
use crate::status::{InvalidStatus, Status, StatusChange, StatusController};
use crate::store::{Asset, PublicationStore, StoreError};
use rayon::prelude::*;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum PublishError {
    #[error(transparent)]
    InvalidIdentifier(#[from] InvalidIdentifier),
    #[error("identifier already in use: {0}")]
    DuplicateIdentifier(Identifier),
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    StorageFailure(StoreError),
    #[error(transparent)]
    InvalidStatus(#[from] InvalidStatus),
    #[error("asset path not allowed: {0}")]
    InvalidAssetPath(String),
    #[error("too many assets: {count} (at most {max})")]
    TooManyAssets { count: usize, max: usize },
    #[error("{identifier}: files were written but the record was not saved: {source}")]
    PartialSuccess {
        identifier: Identifier,
        #[source]
        source: RecordError,
    },
    #[error("record store error: {0}")]
    Record(RecordError),
}

impl From<StoreError> for PublishError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => PublishError::NotFound(what),
            StoreError::InvalidAssetPath(path) => PublishError::InvalidAssetPath(path),
            io @ StoreError::Io { .. } => PublishError::StorageFailure(io),
        }
    }
}

impl From<RecordError> for PublishError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::NotFound(id) => PublishError::NotFound(id.to_string()),
            other => PublishError::Record(other),
        }
    }
}

impl PublishError {
    /// Stable machine-readable name for structured error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            PublishError::InvalidIdentifier(_) => "invalid_identifier",
            PublishError::DuplicateIdentifier(_) => "duplicate_identifier",
            PublishError::NotFound(_) => "not_found",
            PublishError::StorageFailure(_) => "storage_failure",
            PublishError::InvalidStatus(_) => "invalid_status",
            PublishError::InvalidAssetPath(_) => "invalid_asset_path",
            PublishError::TooManyAssets { .. } => "too_many_assets",
            PublishError::PartialSuccess { .. } => "partial_success",
            PublishError::Record(_) => "record_failure",
        }
    }

    /// HTTP status an HTTP front end should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            PublishError::InvalidIdentifier(_)
            | PublishError::InvalidStatus(_)
            | PublishError::InvalidAssetPath(_)
            | PublishError::TooManyAssets { .. } => 400,
            PublishError::NotFound(_) => 404,
            PublishError::DuplicateIdentifier(_) => 409,
            PublishError::PartialSuccess { .. } => 207,
            PublishError::StorageFailure(_) | PublishError::Record(_) => 500,
        }
    }
}

/// The uploaded primary document.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub filename: String,
    pub html: String,
}

#[derive(Debug, Clone)]
pub struct CreateRequest {
    /// Raw identifier as typed by the operator.
    pub identifier: String,
    pub source: SourceDocument,
    pub agent: String,
    pub tracking: TrackingValues,
    pub contact: ContactDetails,
    pub assets: Vec<Asset>,
}

/// Changes to an existing publication. Absent fields keep stored values.
#[derive(Debug, Clone, Default)]
pub struct UpdateRequest {
    /// New document; `None` re-injects over the stored one.
    pub source: Option<SourceDocument>,
    pub agent: Option<String>,
    pub tracking: TrackingUpdate,
    pub contact: ContactUpdate,
    pub assets: Vec<Asset>,
}

/// Result of a successful create or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub identifier: Identifier,
    pub assets: Vec<String>,
}

/// One page's result in [`Publisher::refresh`].
pub type RefreshOutcome = (Identifier, Result<Published, PublishError>);

/// What an HTTP front end should send for a page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResponse {
    pub status: u16,
    pub body: String,
}

pub struct Publisher<R: RecordStore> {
    store: PublicationStore,
    records: R,
    assets: AssetsConfig,
}

impl Publisher<JsonRecordStore> {
    /// Publisher over the configured root and JSON records file.
    pub fn open(config: &PressConfig) -> Result<Self, PublishError> {
        let records = JsonRecordStore::open(&config.records_file)?;
        Ok(Self::new(config, records))
    }
}

impl<R: RecordStore> Publisher<R> {
    pub fn new(config: &PressConfig, records: R) -> Self {
        Self {
            store: PublicationStore::new(config),
            records,
            assets: config.assets.clone(),
        }
    }

    pub fn store(&self) -> &PublicationStore {
        &self.store
    }

    pub fn records(&self) -> &R {
        &self.records
    }

    pub fn status_controller(&self) -> StatusController<'_> {
        StatusController::new(&self.store, &self.records)
    }

    fn check_asset_count(&self, assets: &[Asset]) -> Result<(), PublishError> {
        if assets.len() > self.assets.max_files {
            return Err(PublishError::TooManyAssets {
                count: assets.len(),
                max: self.assets.max_files,
            });
        }
        Ok(())
    }

    /// Publish a new landing page.
    pub fn create(&self, request: CreateRequest) -> Result<Published, PublishError> {
        let id = Identifier::normalize(&request.identifier)?;
        self.check_asset_count(&request.assets)?;
        let tracking = request.tracking.trimmed();

        self.store.with_publication(&id, |publication| {
            if self.records.exists(&id)? {
                return Err(PublishError::DuplicateIdentifier(id.clone()));
            }

            let html = inject::inject(
                &request.source.html,
                &head_fragment(&tracking),
                &body_fragment(&tracking),
            );
            publication.write(&html)?;
            let assets = publication.save_assets(&request.assets)?;

            let record = LandingRecord {
                agent: request.agent.trim().to_string(),
                tracking,
                contact: request.contact.trimmed(),
                original_filename: request.source.filename.clone(),
                ..LandingRecord::new(id.clone())
            };
            self.save_record(&id, record)?;

            info!(%id, assets = assets.len(), "published");
            Ok(Published {
                identifier: id.clone(),
                assets,
            })
        })
    }

    /// Re-publish an existing page with new values and/or a new document.
    ///
    /// Without a new document the active one is re-injected. Fragments are
    /// always rebuilt from the complete merged value set, so a request that
    /// only changes the site tag keeps the body values.
    pub fn update(
        &self,
        identifier: &str,
        request: UpdateRequest,
    ) -> Result<Published, PublishError> {
        let id = Identifier::normalize(identifier)?;
        self.check_asset_count(&request.assets)?;

        self.store.with_publication(&id, |publication| {
            let mut record = self.records.get(&id)?;
            let tracking = record.tracking.merged(&request.tracking);

            let source = match &request.source {
                Some(doc) => doc.html.clone(),
                None => publication.read_active()?,
            };
            let html = inject::inject(
                &source,
                &head_fragment(&tracking),
                &body_fragment(&tracking),
            );
            publication.write(&html)?;
            let assets = publication.save_assets(&request.assets)?;

            if let Some(agent) = &request.agent {
                record.agent = agent.trim().to_string();
            }
            if let Some(doc) = &request.source {
                record.original_filename = doc.filename.clone();
            }
            record.tracking = tracking;
            record.contact = record.contact.merged(&request.contact);
            self.save_record(&id, record)?;

            info!(%id, assets = assets.len(), "updated");
            Ok(Published {
                identifier: id.clone(),
                assets,
            })
        })
    }

    fn save_record(&self, id: &Identifier, record: LandingRecord) -> Result<(), PublishError> {
        self.records.upsert(record).map_err(|source| {
            warn!(%id, error = %source, "publication written but record not saved");
            PublishError::PartialSuccess {
                identifier: id.clone(),
                source,
            }
        })
    }

    /// Change the publication status; see [`StatusController::transition`].
    pub fn set_status(
        &self,
        identifier: &str,
        requested: &str,
    ) -> Result<StatusChange, PublishError> {
        let id = Identifier::normalize(identifier)?;
        self.status_controller().transition(&id, requested)
    }

    /// Remove the publication's files and its record.
    pub fn delete(&self, identifier: &str) -> Result<(), PublishError> {
        let id = Identifier::normalize(identifier)?;
        self.store.with_publication(&id, |publication| {
            self.records.get(&id)?;
            match publication.remove() {
                Ok(()) | Err(StoreError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
            self.records
                .delete(&id)
                .map_err(|source| PublishError::PartialSuccess {
                    identifier: id.clone(),
                    source,
                })?;
            info!(%id, "deleted");
            Ok(())
        })
    }

    /// Adopt a publication directory that exists on disk into the records.
    ///
    /// An existing record keeps its tracking values and contact details;
    /// the status always follows what is on disk.
    pub fn register(
        &self,
        identifier: &str,
        agent: &str,
        original_filename: &str,
    ) -> Result<LandingRecord, PublishError> {
        let id = Identifier::normalize(identifier)?;
        self.store.with_publication(&id, |publication| {
            if !publication.exists()? {
                return Err(PublishError::NotFound(id.to_string()));
            }
            let status = if publication.is_paused()? {
                Status::Paused
            } else {
                Status::Active
            };
            if status == Status::Active && !inject::is_injected(&publication.read_active()?) {
                warn!(%id, "registered page carries no tracking blocks yet");
            }

            let mut record = match self.records.get(&id) {
                Ok(existing) => existing,
                Err(RecordError::NotFound(_)) => LandingRecord::new(id.clone()),
                Err(e) => return Err(e.into()),
            };
            record.agent = agent.trim().to_string();
            record.original_filename = original_filename.to_string();
            record.status = status;
            self.records.upsert(record)?;

            info!(%id, %status, "registered");
            Ok(self.records.get(&id)?)
        })
    }

    /// Re-inject every active page with its stored values.
    ///
    /// Paused pages are skipped: their active document is the placeholder.
    /// Pages are processed in parallel; each one still runs under its own
    /// lock.
    pub fn refresh(&self) -> Result<Vec<RefreshOutcome>, PublishError> {
        let records = self.records.list(&ListFilter {
            status: Some(Status::Active),
            ..Default::default()
        })?;
        let mut results: Vec<_> = records
            .par_iter()
            .map(|record| {
                let id = record.identifier.clone();
                let result = self.update(id.as_str(), UpdateRequest::default());
                (id, result)
            })
            .collect();
        results.sort_by(|a, b| a.0.cmp(&b.0));
        info!(
            pages = results.len(),
            failed = results.iter().filter(|(_, r)| r.is_err()).count(),
            "refresh finished"
        );
        Ok(results)
    }

    /// Repair half-paused directories; see [`PublicationStore::recover`].
    pub fn recover(&self) -> Result<Vec<Identifier>, PublishError> {
        Ok(self.store.recover()?)
    }

    pub fn get(&self, identifier: &str) -> Result<LandingRecord, PublishError> {
        let id = Identifier::normalize(identifier)?;
        Ok(self.records.get(&id)?)
    }

    pub fn list(&self, filter: &ListFilter) -> Result<Vec<LandingRecord>, PublishError> {
        Ok(self.records.list(filter)?)
    }

    /// The active document of `id` exactly as visitors receive it.
    pub fn serve(&self, id: &Identifier) -> Result<String, PublishError> {
        Ok(self.store.read_active(id)?)
    }

    /// Answer a page request: the active document, or a 404 page.
    ///
    /// Malformed identifiers are answered like unknown ones.
    pub fn respond(&self, identifier: &str) -> Result<PageResponse, PublishError> {
        let Ok(id) = Identifier::normalize(identifier) else {
            return Ok(not_found_response(identifier));
        };
        match self.serve(&id) {
            Ok(body) => Ok(PageResponse { status: 200, body }),
            Err(PublishError::NotFound(_)) => Ok(not_found_response(identifier)),
            Err(e) => Err(e),
        }
    }

    /// Filesystem path of a secondary asset of `identifier`.
    pub fn asset(&self, identifier: &str, relative: &str) -> Result<PathBuf, PublishError> {
        let id = Identifier::normalize(identifier)?;
        Ok(self.store.asset_path(&id, relative)?)
    }
}

fn not_found_response(identifier: &str) -> PageResponse {
    PageResponse {
        status: 404,
        body: pages::not_found_page(identifier),
    }
}
