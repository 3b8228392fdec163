//! Fixed documents served in place of a landing page.
//!
//! Both are rendered with [maud](https://maud.lambda.xyz/), so operator
//! supplied text (the paused notice, a requested identifier) is escaped.

use crate::config::PausedConfig;
use maud::{DOCTYPE, Markup, html};

fn base_document(title: &str, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                meta name="robots" content="noindex";
                title { (title) }
            }
            body {
                (content)
            }
        }
    }
}

/// The placeholder written to the active location while a page is paused.
pub fn paused_page(paused: &PausedConfig) -> String {
    base_document(
        &paused.title,
        html! {
            h3 { (paused.message) }
        },
    )
    .into_string()
}

/// Body for the 404 response of an unknown identifier.
pub fn not_found_page(identifier: &str) -> String {
    base_document(
        "Not found",
        html! {
            h1 { "Landing page '" (identifier) "' not found" }
            p { "Please check that the landing page has been published." }
        },
    )
    .into_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paused_page_uses_configured_text() {
        let paused = PausedConfig {
            title: "On hold".into(),
            message: "Back soon.".into(),
        };
        let page = paused_page(&paused);
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("<title>On hold</title>"));
        assert!(page.contains("<h3>Back soon.</h3>"));
    }

    #[test]
    fn paused_page_is_deterministic() {
        let paused = PausedConfig::default();
        assert_eq!(paused_page(&paused), paused_page(&paused));
    }

    #[test]
    fn not_found_page_escapes_identifier() {
        let page = not_found_page("<script>");
        assert!(page.contains("&lt;script&gt;"));
        assert!(!page.contains("'<script>'"));
    }
}
