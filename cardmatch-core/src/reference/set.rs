//! In-memory reference set with locale fallback.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::warn;

use crate::catalogue::Catalogue;
use crate::error::{CardMatchError, Result};
use crate::hash::Fingerprint;

/// Card id → fingerprint for one locale, sorted by card id.
pub type LocaleHashes = BTreeMap<String, Fingerprint>;

/// Read-only matching target: every card's fingerprint per locale, plus the
/// catalogue order used to break similarity ties.
#[derive(Debug, Clone)]
pub struct ReferenceSet {
    default_locale: String,
    locales: BTreeMap<String, Arc<LocaleHashes>>,
    catalogue: Vec<String>,
    explicit_catalogue: bool,
}

impl ReferenceSet {
    pub fn new(default_locale: impl Into<String>) -> Self {
        Self {
            default_locale: default_locale.into(),
            locales: BTreeMap::new(),
            catalogue: Vec::new(),
            explicit_catalogue: false,
        }
    }

    /// Pin candidate order to a catalogue instead of deriving it from the
    /// loaded locales.
    pub fn with_catalogue(mut self, catalogue: &Catalogue) -> Self {
        self.catalogue = catalogue.ids().to_vec();
        self.explicit_catalogue = true;
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>, hashes: LocaleHashes) -> Self {
        self.insert_locale(locale, Arc::new(hashes));
        self
    }

    pub fn insert_locale(&mut self, locale: impl Into<String>, hashes: Arc<LocaleHashes>) {
        self.locales.insert(locale.into(), hashes);
        if !self.explicit_catalogue {
            self.rebuild_catalogue();
        }
    }

    /// Default-locale ids first, then ids only present in other locales.
    fn rebuild_catalogue(&mut self) {
        let mut seen = HashSet::new();
        let mut catalogue = Vec::new();
        let default = self.locales.get(&self.default_locale);
        let others = self
            .locales
            .iter()
            .filter(|(locale, _)| **locale != self.default_locale)
            .map(|(_, hashes)| hashes);
        for hashes in default.into_iter().chain(others) {
            for id in hashes.keys() {
                if seen.insert(id.as_str()) {
                    catalogue.push(id.clone());
                }
            }
        }
        self.catalogue = catalogue;
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    pub fn locales(&self) -> impl Iterator<Item = &str> {
        self.locales.keys().map(String::as_str)
    }

    pub fn locale(&self, locale: &str) -> Option<&LocaleHashes> {
        self.locales.get(locale).map(Arc::as_ref)
    }

    pub fn catalogue(&self) -> &[String] {
        &self.catalogue
    }

    pub fn len(&self) -> usize {
        self.catalogue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalogue.is_empty()
    }

    /// Fingerprint for a card in `locale`, falling back to the default locale.
    pub fn fingerprint(&self, card_id: &str, locale: &str) -> Option<&Fingerprint> {
        self.locales
            .get(locale)
            .and_then(|hashes| hashes.get(card_id))
            .or_else(|| {
                self.locales
                    .get(&self.default_locale)
                    .and_then(|hashes| hashes.get(card_id))
            })
    }

    /// Like [`fingerprint`](Self::fingerprint), but reports the gap.
    pub fn lookup(&self, card_id: &str, locale: &str) -> Result<&Fingerprint> {
        self.fingerprint(card_id, locale)
            .ok_or_else(|| CardMatchError::ReferenceSetIncomplete {
                card_id: card_id.to_string(),
                locale: locale.to_string(),
            })
    }

    /// Every matchable `(card_id, fingerprint)` for `locale`, in catalogue
    /// order. Cards absent from both the active and default locale are left
    /// out of the candidate pool.
    pub fn candidates<'a>(
        &'a self,
        locale: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a Fingerprint)> + 'a {
        self.catalogue.iter().filter_map(move |id| {
            match self.lookup(id, locale) {
                Ok(fp) => Some((id.as_str(), fp)),
                Err(err) => {
                    warn!(error = %err, "Skipping card without reference hash");
                    None
                }
            }
        })
    }
}
