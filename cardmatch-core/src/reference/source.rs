//! Where reference hash files are loaded from.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::format::{hash_file_name, parse_hash_file};
use super::set::LocaleHashes;
use crate::error::{CardMatchError, Result};

/// Async provider of per-locale hash files.
///
/// Implementations must be thread-safe (`Send + Sync`) since one source is
/// shared by every caller of a [`super::ReferenceStore`].
#[async_trait]
pub trait HashSource: Send + Sync {
    /// Load the hashes for `locale`.
    ///
    /// Returns `Ok(None)` when the locale is simply not published, and an
    /// error when it exists but could not be read or parsed.
    async fn load(&self, locale: &str) -> Result<Option<LocaleHashes>>;

    /// Human-readable origin for logs.
    fn describe(&self) -> String;
}

/// Hash files in a local directory, `<root>/<locale>.json`.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl HashSource for DirectorySource {
    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn load(&self, locale: &str) -> Result<Option<LocaleHashes>> {
        let path = self.root.join(hash_file_name(locale)?);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let hashes = parse_hash_file(locale, &bytes)?;
                debug!(entries = hashes.len(), "Loaded hash file");
                Ok(Some(hashes))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No hash file for locale");
                Ok(None)
            }
            Err(e) => Err(CardMatchError::ReferenceSetLoad {
                locale: locale.to_string(),
                reason: format!("{}: {e}", path.display()),
            }),
        }
    }

    fn describe(&self) -> String {
        format!("directory {}", self.root.display())
    }
}
