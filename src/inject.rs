//! Tracking snippet injection.
//!
//! Places a head fragment and a body fragment into an arbitrary HTML
//! document. Uploaded pages come from third-party page builders, so nothing
//! about their structure is assumed: the injector works on text, never
//! parses the DOM, and never fails.
//!
//! ## Placement
//!
//! For each fragment the first applicable rule wins:
//!
//! | Fragment | 1. placeholder | 2. closing tag | 3. fallback |
//! |----------|----------------|----------------|-------------|
//! | head | replace first `<!-- TRACKING_HEAD -->` | insert before first `</head>` | prepend `fragment + "\n"` |
//! | body | replace first `<!-- TRACKING_BODY -->` | insert before first `</body>` | append `"\n" + fragment` |
//!
//! Placeholders and closing tags are matched case-insensitively.
//!
//! ## Re-injection
//!
//! Fragments built by [`fragments`](crate::fragments) are bounded by marker
//! comments (`<!-- landing-press:head -->` ... `<!-- /landing-press:head -->`).
//! Before placing anything, every previously injected block is removed and
//! the first one is turned back into a placeholder. A refreshed snippet
//! therefore lands exactly where the old one was, and the document never
//! holds more than one block of each kind.

use regex::Regex;
use std::sync::LazyLock;

pub const HEAD_OPEN_MARKER: &str = "<!-- landing-press:head -->";
pub const HEAD_CLOSE_MARKER: &str = "<!-- /landing-press:head -->";
pub const BODY_OPEN_MARKER: &str = "<!-- landing-press:body -->";
pub const BODY_CLOSE_MARKER: &str = "<!-- /landing-press:body -->";

/// Comment a page author can put anywhere to pin the head fragment.
pub const HEAD_PLACEHOLDER: &str = "<!-- TRACKING_HEAD -->";
/// Comment a page author can put anywhere to pin the body fragment.
pub const BODY_PLACEHOLDER: &str = "<!-- TRACKING_BODY -->";

static HEAD_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<!--\s*landing-press:head\s*-->.*?<!--\s*/landing-press:head\s*-->")
        .expect("static regex")
});
static BODY_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<!--\s*landing-press:body\s*-->.*?<!--\s*/landing-press:body\s*-->")
        .expect("static regex")
});
static HEAD_PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<!--\s*TRACKING_HEAD\s*-->").expect("static regex"));
static BODY_PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<!--\s*TRACKING_BODY\s*-->").expect("static regex"));
static HEAD_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</head\s*>").expect("static regex"));
static BODY_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</body\s*>").expect("static regex"));

/// Where a fragment goes when the document has neither a placeholder nor
/// the matching closing tag.
#[derive(Debug, Clone, Copy)]
enum Fallback {
    Prepend,
    Append,
}

/// Inject `head` and `body` into `html`, replacing any earlier injection.
///
/// Fragments are inserted verbatim. Only blocks wrapped in the
/// `landing-press:head` / `landing-press:body` markers, as built by
/// [`head_fragment`](crate::fragments::head_fragment) and
/// [`body_fragment`](crate::fragments::body_fragment), are found and replaced
/// on the next injection. Unmarked fragments stay where they were placed, so
/// injecting them again adds another copy.
pub fn inject(html: &str, head: &str, body: &str) -> String {
    let cleaned = strip_blocks(html, &HEAD_BLOCK_RE, HEAD_PLACEHOLDER);
    let cleaned = strip_blocks(&cleaned, &BODY_BLOCK_RE, BODY_PLACEHOLDER);

    let with_head = place(
        &cleaned,
        head,
        &HEAD_PLACEHOLDER_RE,
        &HEAD_CLOSE_RE,
        Fallback::Prepend,
    );
    place(
        &with_head,
        body,
        &BODY_PLACEHOLDER_RE,
        &BODY_CLOSE_RE,
        Fallback::Append,
    )
}

/// Whether `html` carries a block produced by an earlier injection.
pub fn is_injected(html: &str) -> bool {
    HEAD_BLOCK_RE.is_match(html) || BODY_BLOCK_RE.is_match(html)
}

/// Replace the first block matched by `block` with `anchor` and drop the rest.
fn strip_blocks(html: &str, block: &Regex, anchor: &str) -> String {
    let mut first = true;
    block
        .replace_all(html, |_: &regex::Captures<'_>| {
            if std::mem::take(&mut first) {
                anchor
            } else {
                ""
            }
        })
        .into_owned()
}

fn place(
    html: &str,
    fragment: &str,
    placeholder: &Regex,
    closing_tag: &Regex,
    fallback: Fallback,
) -> String {
    if let Some(m) = placeholder.find(html) {
        return [&html[..m.start()], fragment, &html[m.end()..]].concat();
    }
    if let Some(m) = closing_tag.find(html) {
        return [&html[..m.start()], fragment, &html[m.start()..]].concat();
    }
    match fallback {
        Fallback::Prepend => [fragment, "\n", html].concat(),
        Fallback::Append => [html, "\n", fragment].concat(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragments::{TrackingValues, body_fragment, head_fragment};
    use crate::test_helpers::count;

    fn blocks(tag: &str, phone: &str) -> (String, String) {
        let values = TrackingValues {
            global_site_tag: tag.into(),
            phone_tracking: phone.into(),
            ..Default::default()
        };
        (head_fragment(&values), body_fragment(&values))
    }

    // =========================================================================
    // Placement rules
    // =========================================================================

    #[test]
    fn inserts_right_before_closing_tags() {
        let out = inject(
            "<html><head></head><body></body></html>",
            "<!--GA-->",
            "<!--TRACK-->",
        );
        assert_eq!(out, "<html><head><!--GA--></head><body><!--TRACK--></body></html>");
    }

    #[test]
    fn closing_tags_match_case_insensitively() {
        let out = inject("<HTML><HEAD></HEAD><BODY></BODY></HTML>", "H", "B");
        assert_eq!(out, "<HTML><HEAD>H</HEAD><BODY>B</BODY></HTML>");
    }

    #[test]
    fn only_first_closing_tag_is_used() {
        let out = inject("<head></head><head></head><body></body></body>", "H", "B");
        assert_eq!(out, "<head>H</head><head></head><body>B</body></body>");
    }

    #[test]
    fn placeholder_wins_over_closing_tag() {
        let html = "<head><title>t</title><!-- TRACKING_HEAD --><meta></head><body></body>";
        let out = inject(html, "H", "B");
        assert_eq!(out, "<head><title>t</title>H<meta></head><body>B</body>");
        assert_eq!(count(&out, "</head>"), 1);
    }

    #[test]
    fn body_placeholder_is_case_insensitive() {
        let html = "<body><main></main><!--tracking_body--><footer></footer></body>";
        let out = inject(html, "H", "B");
        assert_eq!(out, "H\n<body><main></main>B<footer></footer></body>");
    }

    #[test]
    fn only_first_placeholder_is_replaced() {
        let html = "<!-- TRACKING_BODY --><p></p><!-- TRACKING_BODY -->";
        let out = inject(html, "H", "B");
        assert_eq!(out, "H\nB<p></p><!-- TRACKING_BODY -->");
    }

    #[test]
    fn plain_text_falls_back_to_prepend_and_append() {
        let out = inject("plain text, no tags", "HEAD", "BODY");
        assert!(out.starts_with("HEAD\n"));
        assert!(out.ends_with("\nBODY"));
        assert_eq!(out, "HEAD\nplain text, no tags\nBODY");
    }

    #[test]
    fn empty_document_still_succeeds() {
        assert_eq!(inject("", "H", "B"), "H\n\nB");
    }

    #[test]
    fn fragment_without_head_uses_body_tag() {
        let out = inject("<div>x</div></body>", "H", "B");
        assert_eq!(out, "H\n<div>x</div>B</body>");
    }

    #[test]
    fn input_is_left_untouched() {
        let html = String::from("<head></head>");
        let _ = inject(&html, "H", "B");
        assert_eq!(html, "<head></head>");
    }

    // =========================================================================
    // Re-injection
    // =========================================================================

    #[test]
    fn reinjection_replaces_previous_blocks() {
        let (h1, b1) = blocks("<!--GA-1-->", "phone-1");
        let (h2, b2) = blocks("<!--GA-2-->", "phone-2");
        let page = "<html><head><title>x</title></head><body><p>hi</p></body></html>";

        let once = inject(page, &h1, &b1);
        let twice = inject(&once, &h2, &b2);

        assert_eq!(count(&twice, HEAD_OPEN_MARKER), 1);
        assert_eq!(count(&twice, HEAD_CLOSE_MARKER), 1);
        assert_eq!(count(&twice, BODY_OPEN_MARKER), 1);
        assert_eq!(count(&twice, BODY_CLOSE_MARKER), 1);
        assert!(twice.contains("<!--GA-2-->"));
        assert!(twice.contains("phone-2"));
        assert!(!twice.contains("<!--GA-1-->"));
        assert!(!twice.contains("phone-1"));
    }

    #[test]
    fn reinjection_with_same_values_is_a_fixed_point() {
        let (h, b) = blocks("<!--GA-->", "p");
        let page = "<html><head></head><body></body></html>";
        let once = inject(page, &h, &b);
        assert_eq!(inject(&once, &h, &b), once);
    }

    #[test]
    fn reinjection_keeps_placeholder_position() {
        let (h1, b1) = blocks("one", "1");
        let (h2, b2) = blocks("two", "2");
        let page = "<head><!-- TRACKING_HEAD --><title>t</title></head><body></body>";

        let twice = inject(&inject(page, &h1, &b1), &h2, &b2);

        let block_at = twice.find(HEAD_OPEN_MARKER).unwrap();
        let title_at = twice.find("<title>").unwrap();
        assert!(block_at < title_at);
        assert!(!twice.contains(HEAD_PLACEHOLDER));
    }

    #[test]
    fn reinjection_over_fallback_does_not_accumulate_newlines() {
        let (h1, b1) = blocks("one", "1");
        let (h2, b2) = blocks("two", "2");
        let once = inject("plain", &h1, &b1);
        let twice = inject(&once, &h2, &b2);
        assert_eq!(twice, format!("{h2}\nplain\n{b2}"));
    }

    #[test]
    fn markers_match_regardless_of_case_and_spacing() {
        let page = "<head><!--LANDING-PRESS:HEAD-->old<!--  /landing-press:head  --></head>";
        let out = inject(page, "H", "B");
        assert_eq!(out, "<head>H</head>\nB");
    }

    #[test]
    fn stray_duplicate_blocks_are_all_removed() {
        let (h, b) = blocks("old", "old");
        let page = format!("<head>{h}</head><body>{b}<p></p>{b}</body>");
        let (h2, b2) = blocks("new", "new");
        let out = inject(&page, &h2, &b2);
        assert_eq!(count(&out, BODY_OPEN_MARKER), 1);
        assert!(!out.contains("\"old\""));
    }

    #[test]
    fn unmarked_fragments_accumulate() {
        let once = inject("<head></head><body></body>", "<!--GA-->", "B");
        let twice = inject(&once, "<!--GA-->", "B");
        assert_eq!(count(&twice, "<!--GA-->"), 2);
        assert!(!is_injected(&twice));
    }

    #[test]
    fn is_injected_detects_blocks() {
        let (h, b) = blocks("x", "y");
        assert!(!is_injected("<head></head>"));
        assert!(is_injected(&inject("<head></head>", &h, &b)));
    }
}
