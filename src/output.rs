//! CLI output formatting for every command.
//!
//! Output leads with the identifier, the thing operators search for, and
//! shows details as indented context lines underneath:
//!
//! ## Publish / update
//!
//! ```text
//! Published promo-2024
//!     Assets: anh1.jpg, anh2.png
//! ```
//!
//! ## Status
//!
//! ```text
//! promo-2024: active → paused
//! ```
//!
//! ## List
//!
//! ```text
//! 001 shopee-flash [paused] Lan Nguyen
//! 002 promo-2024 [active] Minh
//!
//! 2 landing pages
//! ```
//!
//! ## Refresh
//!
//! ```text
//! promo-2024: refreshed
//! broken: failed (not found: broken)
//!
//! Refreshed 1 of 2 pages
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::identifier::Identifier;
use crate::publish::{Published, RefreshOutcome};
use crate::records::LandingRecord;
use crate::status::StatusChange;
use crate::store::Transition;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// A value line, with `(empty)` standing in for blank values.
fn field(label: &str, value: &str) -> String {
    if value.is_empty() {
        format!("{}{}: (empty)", indent(1), label)
    } else {
        format!("{}{}: {}", indent(1), label, value)
    }
}

/// Collapse a multi-line snippet to its first line plus a size hint.
fn snippet_summary(snippet: &str) -> String {
    let mut lines = snippet.lines().filter(|l| !l.trim().is_empty());
    match (lines.next(), lines.count()) {
        (None, _) => String::new(),
        (Some(first), 0) => first.trim().to_string(),
        (Some(first), more) => format!("{} (+{} lines)", first.trim(), more),
    }
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{} {}", n, one)
    } else {
        format!("{} {}", n, many)
    }
}

// ============================================================================
// Publish / update
// ============================================================================

pub fn format_published(verb: &str, published: &Published) -> Vec<String> {
    let mut lines = vec![format!("{} {}", verb, published.identifier)];
    if !published.assets.is_empty() {
        lines.push(field("Assets", &published.assets.join(", ")));
    }
    lines
}

pub fn print_published(verb: &str, published: &Published) {
    for line in format_published(verb, published) {
        println!("{}", line);
    }
}

// ============================================================================
// Status
// ============================================================================

pub fn format_status_change(change: &StatusChange) -> Vec<String> {
    if change.from == change.to {
        let mut line = format!("{}: already {}", change.identifier, change.to);
        if change.transition == Some(Transition::Repaired) {
            line.push_str(" (placeholder restored)");
        }
        return vec![line];
    }
    let mut line = format!("{}: {} → {}", change.identifier, change.from, change.to);
    match change.transition {
        Some(Transition::Repaired) => line.push_str(" (placeholder restored)"),
        Some(Transition::Unchanged) => line.push_str(" (files already in place)"),
        _ => {}
    }
    vec![line]
}

pub fn print_status_change(change: &StatusChange) {
    for line in format_status_change(change) {
        println!("{}", line);
    }
}

// ============================================================================
// Records
// ============================================================================

/// Full detail view of one record.
pub fn format_record(record: &LandingRecord) -> Vec<String> {
    vec![
        format!("{} [{}]", record.identifier, record.status),
        field("Agent", &record.agent),
        field("Original file", &record.original_filename),
        field("Global site tag", &snippet_summary(&record.tracking.global_site_tag)),
        field("Phone tracking", &record.tracking.phone_tracking),
        field("Zalo tracking", &record.tracking.zalo_tracking),
        field("Form tracking", &record.tracking.form_tracking),
        field("Hotline", &record.contact.hotline_phone),
        field("Zalo", &record.contact.zalo_phone),
        field("Google form", &record.contact.google_form_link),
        field("Created", &record.created_at.format("%Y-%m-%d %H:%M UTC").to_string()),
        field("Updated", &record.updated_at.format("%Y-%m-%d %H:%M UTC").to_string()),
    ]
}

pub fn print_record(record: &LandingRecord) {
    for line in format_record(record) {
        println!("{}", line);
    }
}

/// One line per record in list order, then a count.
pub fn format_list(records: &[LandingRecord]) -> Vec<String> {
    let mut lines: Vec<String> = records
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let mut line = format!("{} {} [{}]", format_index(i + 1), r.identifier, r.status);
            if !r.agent.is_empty() {
                line.push(' ');
                line.push_str(&r.agent);
            }
            line
        })
        .collect();
    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(plural(records.len(), "landing page", "landing pages"));
    lines
}

pub fn print_list(records: &[LandingRecord]) {
    for line in format_list(records) {
        println!("{}", line);
    }
}

// ============================================================================
// Maintenance
// ============================================================================

pub fn format_refresh(results: &[RefreshOutcome]) -> Vec<String> {
    let mut lines: Vec<String> = results
        .iter()
        .map(|(id, result)| match result {
            Ok(_) => format!("{}: refreshed", id),
            Err(e) => format!("{}: failed ({})", id, e),
        })
        .collect();
    let ok = results.iter().filter(|(_, r)| r.is_ok()).count();
    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!(
        "Refreshed {} of {}",
        ok,
        plural(results.len(), "page", "pages")
    ));
    lines
}

pub fn print_refresh(results: &[RefreshOutcome]) {
    for line in format_refresh(results) {
        println!("{}", line);
    }
}

pub fn format_recovered(repaired: &[Identifier]) -> Vec<String> {
    if repaired.is_empty() {
        return vec!["Nothing to repair".to_string()];
    }
    let mut lines: Vec<String> = repaired
        .iter()
        .map(|id| format!("Repaired {}", id))
        .collect();
    lines.push(String::new());
    lines.push(format!(
        "Restored the placeholder of {}",
        plural(repaired.len(), "paused page", "paused pages")
    ));
    lines
}

pub fn print_recovered(repaired: &[Identifier]) {
    for line in format_recovered(repaired) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
