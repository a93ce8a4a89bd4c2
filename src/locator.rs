//! Index to resource address mapping

use crate::config::SourceConfig;
use crate::types::SegmentIndex;

/// Maps a segment index to its remote address: `{base}{index}{extension}`
///
/// The index is written in plain decimal with no padding, so distinct indices
/// always produce distinct addresses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceLocator {
    base: String,
    extension: String,
}

impl ResourceLocator {
    /// Create a locator from an explicit base and extension
    pub fn new(base: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            extension: extension.into(),
        }
    }

    /// Create a locator from the source section of the configuration
    pub fn from_config(source: &SourceConfig) -> Self {
        Self::new(source.base_url.clone(), source.extension.clone())
    }

    /// Remote address of `index`
    pub fn address(&self, index: SegmentIndex) -> String {
        format!("{}{}{}", self.base, index.get(), self.extension)
    }

    /// Extension appended to every address
    pub fn extension(&self) -> &str {
        &self.extension
    }
}
