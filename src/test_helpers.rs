//! Shared test utilities for the landing-press test suite.
//!
//! Provides an isolated publisher over a temp directory and a record store
//! that can be told to fail, so partial-success paths are testable.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let env = TestEnv::new();
//! let id = create_simple(&env, "promo", "<body>hi</body>");
//! env.records.fail_writes(true);
//! assert!(env.publisher.set_status("promo", "paused").is_err());
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::TempDir;

use crate::config::PressConfig;
use crate::fragments::TrackingValues;
use crate::identifier::Identifier;
use crate::publish::{CreateRequest, Publisher, SourceDocument};
use crate::records::{
    ContactDetails, JsonRecordStore, LandingRecord, ListFilter, RecordError, RecordStore,
};
use crate::status::{Status, StatusController};

/// Non-overlapping occurrences of `needle` in `haystack`.
pub fn count(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

// =========================================================================
// Record store with injectable write failures
// =========================================================================

/// [`JsonRecordStore`] whose writes can be switched to fail.
pub struct FlakyRecords {
    inner: JsonRecordStore,
    fail: AtomicBool,
}

impl FlakyRecords {
    pub fn fail_writes(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), RecordError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RecordError::Io(std::io::Error::other("injected write failure")));
        }
        Ok(())
    }
}

impl RecordStore for FlakyRecords {
    fn exists(&self, id: &Identifier) -> Result<bool, RecordError> {
        self.inner.exists(id)
    }

    fn get(&self, id: &Identifier) -> Result<LandingRecord, RecordError> {
        self.inner.get(id)
    }

    fn upsert(&self, record: LandingRecord) -> Result<(), RecordError> {
        self.check()?;
        self.inner.upsert(record)
    }

    fn set_status(&self, id: &Identifier, status: Status) -> Result<(), RecordError> {
        self.check()?;
        self.inner.set_status(id, status)
    }

    fn list(&self, filter: &ListFilter) -> Result<Vec<LandingRecord>, RecordError> {
        self.inner.list(filter)
    }

    fn delete(&self, id: &Identifier) -> Result<(), RecordError> {
        self.check()?;
        self.inner.delete(id)
    }
}

// =========================================================================
// Test environment
// =========================================================================

/// A publisher rooted in a fresh temp directory.
///
/// The published root is `{tmp}/published` and is not created up front.
pub struct TestEnv {
    _tmp: TempDir,
    pub publisher: Publisher<Arc<FlakyRecords>>,
    pub records: Arc<FlakyRecords>,
}

impl TestEnv {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let config = PressConfig {
            published_root: tmp.path().join("published"),
            records_file: tmp.path().join("landings.json"),
            ..PressConfig::default()
        };
        let records = Arc::new(FlakyRecords {
            inner: JsonRecordStore::open(&config.records_file).unwrap(),
            fail: AtomicBool::new(false),
        });
        let publisher = Publisher::new(&config, Arc::clone(&records));
        Self {
            _tmp: tmp,
            publisher,
            records,
        }
    }

    pub fn controller(&self) -> StatusController<'_> {
        self.publisher.status_controller()
    }

    pub fn record(&self, id: &Identifier) -> LandingRecord {
        self.records.get(id).unwrap()
    }

    pub fn publication_dir(&self, id: &Identifier) -> PathBuf {
        self.publisher.store().root().join(id.as_str())
    }
}

// =========================================================================
// Fixtures
// =========================================================================

/// A create request with empty values for `slug` and `html`.
pub fn create_request(slug: &str, html: &str) -> CreateRequest {
    CreateRequest {
        identifier: slug.to_string(),
        source: SourceDocument {
            filename: "index.html".into(),
            html: html.to_string(),
        },
        agent: String::new(),
        tracking: TrackingValues::default(),
        contact: ContactDetails::default(),
        assets: Vec::new(),
    }
}

/// Publish `html` under `slug` with empty values and return its identifier.
pub fn create_simple(env: &TestEnv, slug: &str, html: &str) -> Identifier {
    env.publisher
        .create(create_request(slug, html))
        .unwrap()
        .identifier
}
