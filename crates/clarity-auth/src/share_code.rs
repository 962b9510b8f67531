//! Share code normalization
//!
//! Users type share codes with or without dashes (`ABCD-1234-EF`,
//! `abcd1234ef `). Redemption wants the bare code; the sharing login wants it
//! regrouped into dash-separated blocks of four.

use common::Secret;

use crate::error::{Error, Result};

/// Characters that appear between groups when a code is written out by hand.
fn is_separator(c: char) -> bool {
    c == '-' || c.is_whitespace()
}

/// Remove every separator character from a raw share code.
pub fn strip_separators(raw: &str) -> String {
    raw.chars().filter(|c| !is_separator(*c)).collect()
}

/// Regroup a normalized code into blocks of four joined by `-`.
///
/// `ABCDEFGHIJ` becomes `ABCD-EFGH-IJ`; there is never a trailing dash.
pub fn insert_dashes(code: &str) -> String {
    let chars: Vec<char> = code.chars().collect();
    chars
        .chunks(4)
        .map(|group| group.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("-")
}

/// A share code with separators removed.
#[derive(Debug, Clone)]
pub struct ShareCode(Secret<String>);

impl ShareCode {
    /// Normalize a user-supplied code.
    ///
    /// Rejects codes that are empty after stripping or that contain anything
    /// other than ASCII letters and digits.
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = strip_separators(raw);
        if normalized.is_empty() {
            return Err(Error::InvalidShareCode("share code is empty".into()));
        }
        if let Some(bad) = normalized.chars().find(|c| !c.is_ascii_alphanumeric()) {
            return Err(Error::InvalidShareCode(format!(
                "unexpected character {bad:?}"
            )));
        }
        Ok(Self(Secret::new(normalized)))
    }

    /// Bare code, as sent to the redemption endpoint.
    pub fn normalized(&self) -> &str {
        self.0.expose()
    }

    /// Dash-grouped code, as sent to the sharing login.
    pub fn dashed(&self) -> String {
        insert_dashes(self.normalized())
    }

    /// Number of characters in the normalized code. Safe to log.
    pub fn len(&self) -> usize {
        self.normalized().len()
    }

    pub fn is_empty(&self) -> bool {
        self.normalized().is_empty()
    }
}
