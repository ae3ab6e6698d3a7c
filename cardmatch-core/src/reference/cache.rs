//! Client-side cache of computed card hashes.
//!
//! A cache is scoped to one locale by its owner and keyed by card id. When the
//! cached count no longer matches the catalogue, [`CatalogueHasher::sync`]
//! hashes only the missing cards.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use dashmap::DashMap;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::set::LocaleHashes;
use crate::catalogue::{ArtworkLocator, Catalogue};
use crate::error::{CardMatchError, Result};
use crate::hash::{CardHasher, Fingerprint};

/// Key-value store of computed fingerprints.
pub trait HashCache: Send + Sync {
    fn get_all(&self) -> Result<HashMap<String, Fingerprint>>;
    fn put_many(&self, entries: Vec<(String, Fingerprint)>) -> Result<()>;
    fn count(&self) -> Result<usize>;
}

/// Volatile cache, for tests and short-lived processes.
#[derive(Debug, Default)]
pub struct MemoryHashCache {
    entries: DashMap<String, Fingerprint>,
}

impl MemoryHashCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HashCache for MemoryHashCache {
    fn get_all(&self) -> Result<HashMap<String, Fingerprint>> {
        Ok(self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect())
    }

    fn put_many(&self, entries: Vec<(String, Fingerprint)>) -> Result<()> {
        for (id, fp) in entries {
            self.entries.insert(id, fp);
        }
        Ok(())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.entries.len())
    }
}

/// Durable cache persisted as a JSON hash file. Every `put_many` rewrites
/// the file through a temporary and rename.
#[derive(Debug)]
pub struct FileHashCache {
    path: PathBuf,
    entries: RwLock<LocaleHashes>,
}

impl FileHashCache {
    /// Open the cache at `path`. A missing file starts empty; an unreadable
    /// one is discarded with a warning, since the cache can always be rebuilt.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Discarding unreadable hash cache");
                LocaleHashes::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => LocaleHashes::new(),
            Err(e) => return Err(CardMatchError::Cache(format!("{}: {e}", path.display()))),
        };
        debug!(path = %path.display(), entries = entries.len(), "Opened hash cache");
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &LocaleHashes) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec(entries)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl HashCache for FileHashCache {
    fn get_all(&self) -> Result<HashMap<String, Fingerprint>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| CardMatchError::Cache("cache lock poisoned".into()))?;
        Ok(entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn put_many(&self, new_entries: Vec<(String, Fingerprint)>) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CardMatchError::Cache("cache lock poisoned".into()))?;
        entries.extend(new_entries);
        self.persist(&entries)
    }

    fn count(&self) -> Result<usize> {
        self.entries
            .read()
            .map(|entries| entries.len())
            .map_err(|_| CardMatchError::Cache("cache lock poisoned".into()))
    }
}

/// Outcome of a cache sync.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Fingerprints for every catalogue card that could be hashed.
    pub hashes: LocaleHashes,
    /// Entries served from the cache.
    pub reused: usize,
    /// Entries computed during this sync.
    pub computed: usize,
    /// Cards without artwork in the requested locale.
    pub missing_artwork: Vec<String>,
    /// Cards whose artwork failed to hash, with the reason.
    pub failed: Vec<(String, String)>,
}

/// Keeps a [`HashCache`] in step with a catalogue.
pub struct CatalogueHasher<'a> {
    cache: &'a dyn HashCache,
    hasher: &'a CardHasher,
    artwork: &'a dyn ArtworkLocator,
}

impl<'a> CatalogueHasher<'a> {
    pub fn new(
        cache: &'a dyn HashCache,
        hasher: &'a CardHasher,
        artwork: &'a dyn ArtworkLocator,
    ) -> Self {
        Self {
            cache,
            hasher,
            artwork,
        }
    }

    /// Ensure every catalogue card has a cached hash for `locale`.
    ///
    /// Only cards absent from the cache are hashed. Cached entries for ids
    /// outside the catalogue stay in the cache but are left out of the report.
    pub fn sync(&self, catalogue: &Catalogue, locale: &str) -> Result<SyncReport> {
        let cached = self.cache.get_all()?;
        let mut report = SyncReport::default();

        let mut missing: Vec<&String> = Vec::new();
        for id in catalogue.ids() {
            match cached.get(id.as_str()) {
                Some(fp) => {
                    report.hashes.insert(id.clone(), fp.clone());
                }
                None => missing.push(id),
            }
        }
        report.reused = report.hashes.len();

        if missing.is_empty() {
            debug!(entries = report.reused, "Hash cache is complete");
            return Ok(report);
        }
        info!(
            cached = self.cache.count()?,
            expected = catalogue.len(),
            missing = missing.len(),
            "Hash cache out of date, hashing missing cards"
        );

        let outcomes: Vec<(String, Option<Result<Fingerprint>>)> = missing
            .par_iter()
            .map(|id| {
                let outcome = self
                    .artwork
                    .locate(id, locale)
                    .map(|source| self.hasher.hash(&source));
                ((*id).clone(), outcome)
            })
            .collect();

        let mut fresh = Vec::new();
        for (id, outcome) in outcomes {
            match outcome {
                Some(Ok(fp)) => fresh.push((id, fp)),
                Some(Err(e)) => {
                    warn!(card_id = %id, error = %e, "Failed to hash card artwork");
                    report.failed.push((id, e.to_string()));
                }
                None => report.missing_artwork.push(id),
            }
        }

        report.computed = fresh.len();
        report.hashes.extend(fresh.iter().cloned());
        self.cache.put_many(fresh)?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::ImageSource;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves generated images and counts how many were requested.
    struct GeneratedArtwork {
        lookups: AtomicUsize,
    }

    impl ArtworkLocator for GeneratedArtwork {
        fn locate(&self, card_id: &str, _locale: &str) -> Option<ImageSource> {
            if card_id == "NO-ART" {
                return None;
            }
            self.lookups.fetch_add(1, Ordering::SeqCst);
            let seed = card_id.bytes().map(u32::from).sum::<u32>();
            let image = RgbImage::from_fn(64, 64, |x, y| {
                Rgb([((x * seed) % 256) as u8, ((y * 7 + seed) % 256) as u8, 90])
            });
            Some(ImageSource::Decoded(DynamicImage::ImageRgb8(image)))
        }
    }

    #[test]
    fn test_sync_hashes_only_missing_cards() {
        let cache = MemoryHashCache::new();
        let hasher = CardHasher::default();
        let artwork = GeneratedArtwork {
            lookups: AtomicUsize::new(0),
        };
        let catalogue = Catalogue::from_ids(["A1-001", "A1-002", "A1-003"]);

        cache
            .put_many(vec![(
                "A1-001".into(),
                Fingerprint::from_words(vec![0; 14]),
            )])
            .unwrap();

        let report = CatalogueHasher::new(&cache, &hasher, &artwork)
            .sync(&catalogue, "en-US")
            .unwrap();
        assert_eq!(report.reused, 1);
        assert_eq!(report.computed, 2);
        assert_eq!(report.hashes.len(), 3);
        assert_eq!(artwork.lookups.load(Ordering::SeqCst), 2);
        assert_eq!(cache.count().unwrap(), 3);

        // Second sync is served from the cache.
        let report = CatalogueHasher::new(&cache, &hasher, &artwork)
            .sync(&catalogue, "en-US")
            .unwrap();
        assert_eq!(report.computed, 0);
        assert_eq!(artwork.lookups.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_sync_ignores_stale_entries_when_counts_match() {
        let cache = MemoryHashCache::new();
        let hasher = CardHasher::default();
        let artwork = GeneratedArtwork {
            lookups: AtomicUsize::new(0),
        };
        let catalogue = Catalogue::from_ids(["A1-001", "A1-002", "A1-003"]);

        // Same size as the catalogue, but one entry is for a retired card.
        cache
            .put_many(vec![
                ("A1-001".into(), Fingerprint::from_words(vec![0; 14])),
                ("A1-002".into(), Fingerprint::from_words(vec![1; 14])),
                ("OLD-999".into(), Fingerprint::from_words(vec![2; 14])),
            ])
            .unwrap();

        let report = CatalogueHasher::new(&cache, &hasher, &artwork)
            .sync(&catalogue, "en-US")
            .unwrap();
        assert_eq!(report.reused, 2);
        assert_eq!(report.computed, 1);
        assert_eq!(artwork.lookups.load(Ordering::SeqCst), 1);
        assert!(report.hashes.contains_key("A1-003"));
        assert!(!report.hashes.contains_key("OLD-999"));
        assert_eq!(report.hashes.len(), 3);
    }

    #[test]
    fn test_sync_reports_missing_artwork() {
        let cache = MemoryHashCache::new();
        let hasher = CardHasher::default();
        let artwork = GeneratedArtwork {
            lookups: AtomicUsize::new(0),
        };
        let catalogue = Catalogue::from_ids(["A1-001", "NO-ART"]);
        let report = CatalogueHasher::new(&cache, &hasher, &artwork)
            .sync(&catalogue, "en-US")
            .unwrap();
        assert_eq!(report.missing_artwork, vec!["NO-ART".to_string()]);
        assert_eq!(report.computed, 1);
    }

    #[test]
    fn test_file_cache_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache/en-US.json");
        {
            let cache = FileHashCache::open(&path).unwrap();
            assert_eq!(cache.count().unwrap(), 0);
            cache
                .put_many(vec![("A1-001".into(), Fingerprint::from_words(vec![3; 14]))])
                .unwrap();
        }
        let reopened = FileHashCache::open(&path).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
        assert_eq!(
            reopened.get_all().unwrap().get("A1-001"),
            Some(&Fingerprint::from_words(vec![3; 14]))
        );
    }

    #[test]
    fn test_file_cache_discards_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, b"{{{{").unwrap();
        assert_eq!(FileHashCache::open(&path).unwrap().count().unwrap(), 0);
    }
}
