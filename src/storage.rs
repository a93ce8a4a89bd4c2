//! Local segment storage
//!
//! One file per index, named from the zero-padded index and the source
//! extension. A file that exists with a non-zero size is a valid copy; there is
//! no checksum. Writes go to a `.part` sibling first and are renamed into place
//! once the whole body is on disk, so an interrupted write never looks valid.

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{SegmentIndex, SegmentRecord};

const PARTIAL_SUFFIX: &str = ".part";

/// Download directory holding one file per segment
#[derive(Clone, Debug)]
pub struct SegmentStore {
    dir: PathBuf,
    extension: String,
    index_width: usize,
}

impl SegmentStore {
    /// Create the directory if needed and resolve it to an absolute path
    pub async fn open(dir: &Path, extension: &str, index_width: usize) -> Result<Self> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| Error::Storage {
                path: dir.to_path_buf(),
                source,
            })?;
        let dir = std::path::absolute(dir).map_err(|source| Error::Storage {
            path: dir.to_path_buf(),
            source,
        })?;

        Ok(Self {
            dir,
            extension: extension.to_string(),
            index_width,
        })
    }

    /// Open the store described by the download section of `config`
    pub async fn from_config(config: &Config) -> Result<Self> {
        Self::open(
            &config.download.download_dir,
            &config.source.extension,
            config.download.index_width,
        )
        .await
    }

    /// Absolute path of the download directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name for `index`, e.g. `00042.ts`
    pub fn file_name(&self, index: SegmentIndex) -> String {
        format!(
            "{:0width$}{}",
            index.get(),
            self.extension,
            width = self.index_width
        )
    }

    /// Absolute destination path for `index`
    pub fn path_for(&self, index: SegmentIndex) -> PathBuf {
        self.dir.join(self.file_name(index))
    }

    /// Return a record for `index` if a non-empty local copy already exists
    pub async fn existing(&self, index: SegmentIndex) -> Option<SegmentRecord> {
        let path = self.path_for(index);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() && meta.len() > 0 => Some(SegmentRecord { index, path }),
            _ => None,
        }
    }

    /// Write a complete segment body and return its record
    ///
    /// Empty bodies are refused so a zero-length file is never reported as stored.
    pub async fn persist(&self, index: SegmentIndex, body: &[u8]) -> Result<SegmentRecord> {
        let path = self.path_for(index);
        if body.is_empty() {
            return Err(Error::Storage {
                path,
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "response body was empty",
                ),
            });
        }

        let partial = self.dir.join(format!("{}{}", self.file_name(index), PARTIAL_SUFFIX));
        if let Err(source) = tokio::fs::write(&partial, body).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(Error::Storage { path, source });
        }
        if let Err(source) = tokio::fs::rename(&partial, &path).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(Error::Storage { path, source });
        }

        Ok(SegmentRecord { index, path })
    }
}
