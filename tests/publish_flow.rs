//! End-to-end publishing flow through the public API.

use landing_press::config::PressConfig;
use landing_press::fragments::{TrackingUpdate, TrackingValues, body_fragment, head_fragment};
use landing_press::identifier::Identifier;
use landing_press::inject::{BODY_OPEN_MARKER, HEAD_OPEN_MARKER};
use landing_press::publish::{
    CreateRequest, PublishError, Publisher, SourceDocument, UpdateRequest,
};
use landing_press::records::{ContactDetails, JsonRecordStore, ListFilter};
use landing_press::status::Status;
use landing_press::store::PAUSED_FILENAME;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

const PAGE: &str = "<html><head></head><body></body></html>";

fn setup() -> (TempDir, PressConfig, Publisher<JsonRecordStore>) {
    let tmp = TempDir::new().unwrap();
    let config = PressConfig {
        published_root: tmp.path().join("published"),
        records_file: tmp.path().join("landings.json"),
        ..PressConfig::default()
    };
    let publisher = Publisher::open(&config).unwrap();
    (tmp, config, publisher)
}

fn create(publisher: &Publisher<JsonRecordStore>, slug: &str, tracking: TrackingValues) {
    publisher
        .create(CreateRequest {
            identifier: slug.to_string(),
            source: SourceDocument {
                filename: "index.html".into(),
                html: PAGE.into(),
            },
            agent: "Lan".into(),
            tracking,
            contact: ContactDetails::default(),
            assets: Vec::new(),
        })
        .unwrap();
}

fn id(s: &str) -> Identifier {
    Identifier::normalize(s).unwrap()
}

fn tag_update(tag: &str) -> UpdateRequest {
    UpdateRequest {
        tracking: TrackingUpdate {
            global_site_tag: Some(tag.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

#[test]
fn publish_update_pause_resume_delete() {
    let (_tmp, config, publisher) = setup();
    let tracking = TrackingValues {
        global_site_tag: "<!--GA-->".into(),
        phone_tracking: "P1".into(),
        ..Default::default()
    };
    create(&publisher, "Promo-2024", tracking.clone());
    let promo = id("promo-2024");

    let served = publisher.serve(&promo).unwrap();
    assert_eq!(
        served,
        format!(
            "<html><head>{}</head><body>{}</body></html>",
            head_fragment(&tracking),
            body_fragment(&tracking)
        )
    );

    // Changing only the site tag keeps the body values and a single block.
    publisher.update("promo-2024", tag_update("<!--GA2-->")).unwrap();
    let served = publisher.serve(&promo).unwrap();
    assert!(served.contains("<!--GA2-->"));
    assert!(!served.contains("<!--GA-->"));
    assert!(served.contains(r#"window.PHONE_TRACKING="P1";"#));
    assert_eq!(served.matches(HEAD_OPEN_MARKER).count(), 1);
    assert_eq!(served.matches(BODY_OPEN_MARKER).count(), 1);

    // Pause serves the placeholder; a second pause keeps the original.
    publisher.set_status("promo-2024", "paused").unwrap();
    publisher.set_status("promo-2024", "paused").unwrap();
    let placeholder = publisher.serve(&promo).unwrap();
    assert!(placeholder.contains(&config.paused.message));
    assert_eq!(publisher.get("promo-2024").unwrap().status, Status::Paused);

    // Editing while paused replaces the served document only.
    let paused_path = config.published_root.join("promo-2024").join(PAUSED_FILENAME);
    let preserved = std::fs::read_to_string(&paused_path).unwrap();
    publisher.update("promo-2024", tag_update("<!--GA3-->")).unwrap();
    assert!(publisher.serve(&promo).unwrap().contains("<!--GA3-->"));
    assert_eq!(std::fs::read_to_string(&paused_path).unwrap(), preserved);

    // Resume brings back the page as it was when paused.
    publisher.set_status("promo-2024", "active").unwrap();
    let served = publisher.serve(&promo).unwrap();
    assert_eq!(served, preserved);
    assert!(served.contains("<!--GA2-->"));
    assert!(!served.contains("<!--GA3-->"));
    assert_eq!(served.matches(HEAD_OPEN_MARKER).count(), 1);
    assert!(!paused_path.exists());

    publisher.delete("promo-2024").unwrap();
    assert!(matches!(publisher.serve(&promo), Err(PublishError::NotFound(_))));
    assert_eq!(publisher.respond("promo-2024").unwrap().status, 404);
}

#[test]
fn records_survive_reopen() {
    let (_tmp, config, publisher) = setup();
    create(&publisher, "a", TrackingValues::default());
    create(&publisher, "b", TrackingValues::default());
    publisher.set_status("b", "paused").unwrap();
    drop(publisher);

    let reopened = Publisher::open(&config).unwrap();
    let paused = reopened
        .list(&ListFilter {
            status: Some(Status::Paused),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(paused.len(), 1);
    assert_eq!(paused[0].identifier, id("b"));
    assert_eq!(paused[0].agent, "Lan");
}

#[test]
fn invalid_requests_change_nothing() {
    let (_tmp, config, publisher) = setup();
    create(&publisher, "promo", TrackingValues::default());
    let before = publisher.serve(&id("promo")).unwrap();

    let err = publisher.set_status("promo", "archived").unwrap_err();
    assert_eq!(err.status_code(), 400);
    let err = publisher.update("Bad Name", UpdateRequest::default()).unwrap_err();
    assert_eq!(err.status_code(), 400);

    assert_eq!(publisher.serve(&id("promo")).unwrap(), before);
    assert!(!config.published_root.join("bad name").exists());
}

#[test]
fn concurrent_edits_on_one_page_stay_consistent() {
    let (_tmp, _config, publisher) = setup();
    create(&publisher, "promo", TrackingValues::default());
    let publisher = Arc::new(publisher);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let publisher = Arc::clone(&publisher);
            thread::spawn(move || {
                if i % 3 == 0 {
                    let status = if i % 2 == 0 { "paused" } else { "active" };
                    publisher.set_status("promo", status).unwrap();
                } else {
                    publisher
                        .update("promo", tag_update(&format!("<!--GA{i}-->")))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    publisher.set_status("promo", "active").unwrap();
    let served = publisher.serve(&id("promo")).unwrap();
    assert_eq!(served.matches(HEAD_OPEN_MARKER).count(), 1);
    assert_eq!(served.matches(BODY_OPEN_MARKER).count(), 1);
    assert_eq!(publisher.get("promo").unwrap().status, Status::Active);
}

#[test]
fn refresh_and_recover_over_many_pages() {
    let (_tmp, config, publisher) = setup();
    for slug in ["one", "two", "three"] {
        create(&publisher, slug, TrackingValues::default());
    }
    publisher.set_status("two", "paused").unwrap();
    // Interrupted pause: preserved document, no placeholder.
    std::fs::remove_file(config.published_root.join("two").join("index.html")).unwrap();

    assert_eq!(publisher.recover().unwrap(), vec![id("two")]);
    // Paused pages keep their placeholder untouched.
    let results = publisher.refresh().unwrap();
    let mut refreshed: Vec<_> = results.iter().map(|(id, _)| id.to_string()).collect();
    refreshed.sort();
    assert_eq!(refreshed, vec!["one", "three"]);
    assert!(results.iter().all(|(_, r)| r.is_ok()));
    assert!(
        publisher
            .serve(&id("two"))
            .unwrap()
            .contains(&config.paused.message)
    );
}
