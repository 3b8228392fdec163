//! Publication identifiers.
//!
//! An identifier is the public, subdomain-like token a landing page is
//! published under. It doubles as the name of the publication's directory
//! under the published root, so the accepted alphabet is deliberately tiny:
//!
//! - `" Shopee-Sale "` → `shopee-sale` (trimmed and lowercased first)
//! - `"promo-2024"` → `promo-2024`
//! - `"My-Site_1"` → invalid (underscore)
//! - `""` → invalid
//!
//! Once a page is published its identifier never changes; republishing
//! reuses it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Longest accepted identifier, in bytes.
pub const MAX_LEN: usize = 40;

/// Raised when a raw string cannot be normalized into an [`Identifier`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid identifier {raw:?}: expected 1-{} characters of a-z, 0-9 or '-'", MAX_LEN)]
pub struct InvalidIdentifier {
    pub raw: String,
}

/// A validated identifier matching `^[a-z0-9-]{1,40}$`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Trim and lowercase `raw`, then accept it only if every character is
    /// an ASCII lowercase letter, digit or hyphen and the length is 1..=40.
    pub fn normalize(raw: &str) -> Result<Self, InvalidIdentifier> {
        let candidate = raw.trim().to_lowercase();
        let valid = (1..=MAX_LEN).contains(&candidate.len())
            && candidate
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
        if valid {
            Ok(Self(candidate))
        } else {
            Err(InvalidIdentifier {
                raw: raw.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Identifier {
    type Err = InvalidIdentifier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::normalize(s)
    }
}

impl TryFrom<String> for Identifier {
    type Error = InvalidIdentifier;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::normalize(&value)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
