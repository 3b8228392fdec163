//! Publication status and the active/paused state machine.
//!
//! ```text
//!            pause (store renames, writes placeholder)
//!   active ───────────────────────────────────────────▶ paused
//!          ◀───────────────────────────────────────────
//!            resume (store renames original back)
//! ```
//!
//! The recorded status decides whether the store is touched at all: pausing
//! a page already recorded as paused would otherwise overwrite the preserved
//! original with the placeholder. The record is updated only after the store
//! operation succeeded.

use crate::identifier::Identifier;
use crate::publish::PublishError;
use crate::records::RecordStore;
use crate::store::{PublicationStore, Transition};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Active,
    Paused,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Active => "active",
            Status::Paused => "paused",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid status {0:?}: expected \"active\" or \"paused\"")]
pub struct InvalidStatus(pub String);

impl FromStr for Status {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Status::Active),
            "paused" => Ok(Status::Paused),
            other => Err(InvalidStatus(other.to_string())),
        }
    }
}

/// Result of a status change request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub identifier: Identifier,
    pub from: Status,
    pub to: Status,
    /// What happened on disk; `None` when the store was not touched.
    pub transition: Option<Transition>,
}

/// Drives pause/resume against the store and keeps the record in step.
pub struct StatusController<'a> {
    store: &'a PublicationStore,
    records: &'a dyn RecordStore,
}

impl<'a> StatusController<'a> {
    pub fn new(store: &'a PublicationStore, records: &'a dyn RecordStore) -> Self {
        Self { store, records }
    }

    /// Move `id` to `requested` ("active" or "paused").
    ///
    /// The requested value is validated before anything is read or written.
    /// A store failure leaves the record untouched; a record failure after
    /// the store moved is reported as [`PublishError::PartialSuccess`], and
    /// repeating the request completes it.
    pub fn transition(
        &self,
        id: &Identifier,
        requested: &str,
    ) -> Result<StatusChange, PublishError> {
        let to: Status = requested.trim().parse()?;

        self.store.with_publication(id, |publication| {
            let record = self.records.get(id)?;
            let from = record.status;

            let transition = match (from, to) {
                (Status::Active, Status::Paused) => Some(publication.pause()?),
                (Status::Paused, Status::Active) => Some(publication.resume()?),
                _ => None,
            };

            if from != to {
                self.records
                    .set_status(id, to)
                    .map_err(|source| {
                        warn!(%id, %to, error = %source, "store moved but status was not recorded");
                        PublishError::PartialSuccess {
                            identifier: id.clone(),
                            source,
                        }
                    })?;
                info!(%id, %from, %to, "status changed");
            }

            Ok(StatusChange {
                identifier: id.clone(),
                from,
                to,
                transition,
            })
        })
    }
}
