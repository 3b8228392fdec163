//! Tracking fragment assembly.
//!
//! Turns the operator-supplied tracking values into the two blocks of markup
//! the [`inject`](crate::inject) module places into a page:
//!
//! ```text
//! <!-- landing-press:head -->
//! {global_site_tag}
//! <!-- /landing-press:head -->
//! ```
//!
//! ```text
//! <!-- landing-press:body -->
//! <script>window.PHONE_TRACKING="...";</script>
//! <script>window.ZALO_TRACKING="...";</script>
//! <script>window.FORM_TRACKING="...";</script>
//! <!-- /landing-press:body -->
//! ```
//!
//! The bounding markers are what lets a later injection find and remove the
//! block again. This is plain string assembly: the global site tag is pasted
//! verbatim because it legitimately contains `<script>` tags. Escaping it is
//! the caller's concern. The three body values are emitted as JSON string
//! literals, which are valid JavaScript string literals.

use crate::inject::{BODY_CLOSE_MARKER, BODY_OPEN_MARKER, HEAD_CLOSE_MARKER, HEAD_OPEN_MARKER};
use serde::{Deserialize, Serialize};

/// The values injected into every published page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingValues {
    /// Analytics snippet placed in `<head>`, usually a gtag.js block.
    pub global_site_tag: String,
    pub phone_tracking: String,
    pub zalo_tracking: String,
    pub form_tracking: String,
}

/// Optional overrides for [`TrackingValues`]; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackingUpdate {
    pub global_site_tag: Option<String>,
    pub phone_tracking: Option<String>,
    pub zalo_tracking: Option<String>,
    pub form_tracking: Option<String>,
}

impl TrackingValues {
    /// Apply `update` on top of `self`, trimming every supplied value.
    pub fn merged(&self, update: &TrackingUpdate) -> Self {
        fn pick(new: &Option<String>, old: &str) -> String {
            new.as_deref().map(str::trim).unwrap_or(old).to_string()
        }
        Self {
            global_site_tag: pick(&update.global_site_tag, &self.global_site_tag),
            phone_tracking: pick(&update.phone_tracking, &self.phone_tracking),
            zalo_tracking: pick(&update.zalo_tracking, &self.zalo_tracking),
            form_tracking: pick(&update.form_tracking, &self.form_tracking),
        }
    }

    /// Copy with every value trimmed.
    pub fn trimmed(&self) -> Self {
        Self::default().merged(&TrackingUpdate {
            global_site_tag: Some(self.global_site_tag.clone()),
            phone_tracking: Some(self.phone_tracking.clone()),
            zalo_tracking: Some(self.zalo_tracking.clone()),
            form_tracking: Some(self.form_tracking.clone()),
        })
    }
}

/// Head block: the global site tag between the head markers.
pub fn head_fragment(values: &TrackingValues) -> String {
    format!(
        "{HEAD_OPEN_MARKER}\n{}\n{HEAD_CLOSE_MARKER}",
        values.global_site_tag
    )
}

/// Body block: one `<script>` per tracking value between the body markers.
pub fn body_fragment(values: &TrackingValues) -> String {
    format!(
        "{BODY_OPEN_MARKER}\n\
         <script>window.PHONE_TRACKING={};</script>\n\
         <script>window.ZALO_TRACKING={};</script>\n\
         <script>window.FORM_TRACKING={};</script>\n\
         {BODY_CLOSE_MARKER}",
        js_string(&values.phone_tracking),
        js_string(&values.zalo_tracking),
        js_string(&values.form_tracking),
    )
}

/// Render `value` as a double-quoted JavaScript string literal.
///
/// `</` is split so a value cannot close the surrounding `<script>` element.
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string())
        .to_string()
        .replace("</", "<\\/")
}
