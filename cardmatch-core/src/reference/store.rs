//! Memoized, single-flight reference hash loading.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::{info, instrument, warn};

use super::set::{LocaleHashes, ReferenceSet};
use super::source::HashSource;
use crate::error::{CardMatchError, Result};

/// Long-lived owner of the reference hashes for a session.
///
/// Each locale is fetched at most once. Concurrent callers asking for the same
/// locale share one in-flight load. A failed load is not memoized, so the next
/// caller retries it.
pub struct ReferenceStore {
    source: Arc<dyn HashSource>,
    default_locale: String,
    loaded: DashMap<String, Arc<OnceCell<Arc<LocaleHashes>>>>,
}

impl ReferenceStore {
    pub fn new(source: Arc<dyn HashSource>, default_locale: impl Into<String>) -> Self {
        Self {
            source,
            default_locale: default_locale.into(),
            loaded: DashMap::new(),
        }
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    /// Hashes for one locale. The default locale must exist; any other
    /// locale that is not published loads as empty.
    #[instrument(skip(self))]
    pub async fn locale(&self, locale: &str) -> Result<Arc<LocaleHashes>> {
        let cell = self
            .loaded
            .entry(locale.to_string())
            .or_default()
            .value()
            .clone();

        cell.get_or_try_init(|| async {
            match self.source.load(locale).await? {
                Some(hashes) => {
                    info!(
                        source = %self.source.describe(),
                        entries = hashes.len(),
                        "Loaded reference hashes"
                    );
                    Ok(Arc::new(hashes))
                }
                None if locale == self.default_locale => Err(CardMatchError::ReferenceSetLoad {
                    locale: locale.to_string(),
                    reason: format!("no hash file in {}", self.source.describe()),
                }),
                None => {
                    warn!("No localized reference hashes, default locale will be used");
                    Ok(Arc::new(LocaleHashes::new()))
                }
            }
        })
        .await
        .cloned()
    }

    /// Reference set for matching in `locale`, with the default locale
    /// loaded as fallback.
    pub async fn reference_set(&self, locale: &str) -> Result<ReferenceSet> {
        let mut set = ReferenceSet::new(self.default_locale.clone());
        set.insert_locale(self.default_locale.clone(), self.locale(&self.default_locale).await?);
        if locale != self.default_locale {
            set.insert_locale(locale, self.locale(locale).await?);
        }
        Ok(set)
    }

    /// Locales whose load has completed successfully.
    pub fn loaded_locales(&self) -> Vec<String> {
        let mut locales: Vec<String> = self
            .loaded
            .iter()
            .filter(|entry| entry.value().initialized())
            .map(|entry| entry.key().clone())
            .collect();
        locales.sort();
        locales
    }
}

impl std::fmt::Debug for ReferenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceStore")
            .field("source", &self.source.describe())
            .field("default_locale", &self.default_locale)
            .field("loaded", &self.loaded_locales())
            .finish()
    }
}
