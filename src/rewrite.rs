//! Identifier rewriting for restored datasets
//!
//! A snapshot carries an environment descriptor recording the origin's
//! public base URLs. On restore, the dump script is rewritten once, before
//! any statement executes, replacing the origin base URL with the
//! destination's current base URL as a literal (non-regex) substring.
//!
//! Known limitation: serialized-data blobs that embed URLs behind length
//! prefixes are rewritten naively like any other text. If origin and
//! destination URLs differ in length, such blobs end up with stale length
//! prefixes. Fixing that would require format-aware rewriting, which is
//! out of scope.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SitepackError};

/// Origin base URLs captured at export time
///
/// Rendered as the two-line `key=value` text entry of every snapshot.
/// Produced once per snapshot, consumed once per restore, never persisted
/// beyond the archive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvDescriptor {
    /// Public base URL of the application
    pub siteurl: String,
    /// Public home URL (usually equal to `siteurl`)
    pub home: String,
}

impl EnvDescriptor {
    /// Create a descriptor from explicit URL values
    pub fn new(siteurl: impl Into<String>, home: impl Into<String>) -> Self {
        Self {
            siteurl: siteurl.into(),
            home: home.into(),
        }
    }

    /// Parse the descriptor text format (`siteurl=<value>\nhome=<value>`)
    ///
    /// Blank lines and unknown keys are ignored; a missing `siteurl` key is
    /// an error since it is the replace-from side of the rewrite.
    pub fn parse(text: &str) -> Result<Self> {
        let mut siteurl = None;
        let mut home = None;
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match line.split_once('=') {
                Some(("siteurl", value)) => siteurl = Some(value.to_string()),
                Some(("home", value)) => home = Some(value.to_string()),
                Some(_) => continue,
                None => {
                    return Err(SitepackError::InvalidDescriptor(format!(
                        "line without key=value form: {line}"
                    )))
                }
            }
        }
        let siteurl = siteurl.ok_or_else(|| {
            SitepackError::InvalidDescriptor("missing siteurl entry".to_string())
        })?;
        let home = home.unwrap_or_else(|| siteurl.clone());
        Ok(Self { siteurl, home })
    }

    /// Render the descriptor text format
    pub fn render(&self) -> String {
        format!("siteurl={}\nhome={}", self.siteurl, self.home)
    }
}

/// Replace the origin base URL with the destination URL across a script
///
/// A literal substring replacement applied once over the whole script.
/// Rewriting is skipped when the origin URL is empty (nothing meaningful
/// to replace) or already equals the destination, in which case the output
/// is byte-identical to the input.
pub fn rewrite_script(script: &str, origin: &EnvDescriptor, destination_url: &str) -> String {
    if origin.siteurl.is_empty() || origin.siteurl == destination_url {
        return script.to_string();
    }
    debug!(
        origin = %origin.siteurl,
        destination = %destination_url,
        "rewriting origin URL in dump script"
    );
    script.replace(&origin.siteurl, destination_url)
}
