//! # Landing Press
//!
//! Publishes uploaded landing pages under short identifiers, injects the
//! operator's tracking snippets into them, and pauses or resumes them on
//! demand. Pages come from third-party builders, so the injector treats them
//! as text and never fails on malformed markup.
//!
//! # Architecture
//!
//! ```text
//! operator ──▶ Publisher ──▶ fragments ──▶ inject ──▶ PublicationStore (files)
//!                  │                                        ▲
//!                  ├──▶ StatusController ───────────────────┘
//!                  └──▶ RecordStore (metadata)
//! ```
//!
//! The filesystem is the serving surface: a publication is the directory
//! `{published_root}/{identifier}/` and visitors get its `index.html`. The
//! record store holds everything else (agent, tracking values, status).
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`identifier`] | Normalizes and validates publication identifiers |
//! | [`fragments`] | Builds the head and body tracking blocks from the tracking values |
//! | [`inject`] | Places tracking blocks into a document, replacing earlier ones |
//! | [`pages`] | Paused placeholder and not-found documents, rendered with Maud |
//! | [`store`] | Publication directories: atomic writes, pause/resume, assets, locking |
//! | [`records`] | `RecordStore` trait and the JSON-file implementation |
//! | [`status`] | `Status` and the active/paused transition controller |
//! | [`publish`] | The `Publisher` orchestration and the `PublishError` taxonomy |
//! | [`config`] | `landing-press.toml` loading and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Idempotent Injection
//!
//! Tracking blocks are bounded by marker comments. Injecting removes every
//! earlier block before placing the new one, and the first earlier block
//! becomes the insertion point. Refreshing a page any number of times
//! leaves exactly one block of each kind, in the same place.
//!
//! ## Pausing Never Loses the Original
//!
//! Pausing renames the active document aside before the placeholder is
//! written. A crash in between leaves a paused document without a
//! placeholder, which [`store::PublicationStore::recover`] repairs; the
//! original is never overwritten. Edits made while paused replace the
//! served document only; resuming brings back the page preserved at pause.
//!
//! ## Files First, Record Second
//!
//! Every mutating operation writes files before touching the record store.
//! A record failure after the files moved is reported as
//! [`publish::PublishError::PartialSuccess`] and repeating the operation
//! completes it.

pub mod config;
pub mod fragments;
pub mod identifier;
pub mod inject;
pub mod output;
pub mod pages;
pub mod publish;
pub mod records;
pub mod status;
pub mod store;

#[cfg(test)]
pub(crate) mod test_helpers;
