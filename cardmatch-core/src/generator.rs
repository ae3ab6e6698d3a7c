//! Offline reference hash generation and verification.
//!
//! [`build`] hashes every catalogue card in every locale that has artwork for
//! it. [`verify`] recomputes hashes and compares them against the stored files
//! so stale reference data is caught before it ships.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::catalogue::{ArtworkLocator, Catalogue};
use crate::error::{CardMatchError, Result};
use crate::hash::{similarity, CardHasher, Fingerprint};
use crate::reference::{read_hash_file, write_hash_file, LocaleHashes};

/// Stored and recomputed hashes of the same card must be at least this
/// similar.
pub const VERIFY_SIMILARITY_THRESHOLD: f64 = 0.99;

/// Hashes grouped by locale.
pub type HashesByLocale = BTreeMap<String, LocaleHashes>;

/// A card whose artwork exists but could not be hashed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildFailure {
    pub locale: String,
    pub card_id: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct BuildReport {
    pub hashes: HashesByLocale,
    /// `(locale, card_id)` pairs without artwork. Not an error: many cards
    /// only have art in some locales.
    pub skipped: usize,
    pub failures: Vec<BuildFailure>,
}

impl BuildReport {
    pub fn hashed(&self) -> usize {
        self.hashes.values().map(LocaleHashes::len).sum()
    }
}

enum Outcome {
    Hashed(String, String, Fingerprint),
    Skipped,
    Failed(BuildFailure),
}

/// Hash every `(card, locale)` pair that has artwork.
///
/// Every requested locale gets an entry in the report, even when it ended up
/// empty.
#[instrument(skip_all, fields(cards = catalogue.len(), locales = locales.len()))]
pub fn build(
    catalogue: &Catalogue,
    locales: &[String],
    artwork: &dyn ArtworkLocator,
    hasher: &CardHasher,
) -> BuildReport {
    let jobs: Vec<(&String, &String)> = locales
        .iter()
        .flat_map(|locale| catalogue.ids().iter().map(move |id| (locale, id)))
        .collect();

    let outcomes: Vec<Outcome> = jobs
        .into_par_iter()
        .map(|(locale, card_id)| {
            let Some(source) = artwork.locate(card_id, locale) else {
                return Outcome::Skipped;
            };
            match hasher.hash(&source) {
                Ok(fp) => {
                    debug!(%locale, %card_id, "Hashed card");
                    Outcome::Hashed(locale.clone(), card_id.clone(), fp)
                }
                Err(e) => {
                    warn!(%locale, %card_id, error = %e, "Failed to hash card artwork");
                    Outcome::Failed(BuildFailure {
                        locale: locale.clone(),
                        card_id: card_id.clone(),
                        reason: e.to_string(),
                    })
                }
            }
        })
        .collect();

    let mut report = BuildReport {
        hashes: locales
            .iter()
            .map(|locale| (locale.clone(), LocaleHashes::new()))
            .collect(),
        ..Default::default()
    };
    for outcome in outcomes {
        match outcome {
            Outcome::Hashed(locale, card_id, fp) => {
                report.hashes.entry(locale).or_default().insert(card_id, fp);
            }
            Outcome::Skipped => report.skipped += 1,
            Outcome::Failed(failure) => report.failures.push(failure),
        }
    }

    info!(
        hashed = report.hashed(),
        skipped = report.skipped,
        failed = report.failures.len(),
        "Reference hash build complete"
    );
    report
}

/// Write one `<locale>.json` per locale into `dir`.
pub fn write_hash_files(dir: &Path, hashes: &HashesByLocale) -> Result<Vec<PathBuf>> {
    hashes
        .iter()
        .map(|(locale, entries)| {
            let path = write_hash_file(dir, locale, entries)?;
            info!(path = %path.display(), entries = entries.len(), "Wrote hash file");
            Ok(path)
        })
        .collect()
}

/// Read the hash files of `locales` from `dir`. A locale without a file loads
/// as empty.
pub fn load_hash_files(dir: &Path, locales: &[String]) -> Result<HashesByLocale> {
    locales
        .iter()
        .map(|locale| {
            let hashes = read_hash_file(dir, locale)?.unwrap_or_else(|| {
                warn!(%locale, dir = %dir.display(), "No stored hash file");
                LocaleHashes::new()
            });
            Ok((locale.clone(), hashes))
        })
        .collect()
}

/// A stored hash that no longer matches its artwork.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Drift {
    pub locale: String,
    pub card_id: String,
    pub similarity: f64,
}

impl From<Drift> for CardMatchError {
    fn from(drift: Drift) -> Self {
        CardMatchError::VerificationDrift {
            locale: drift.locale,
            card_id: drift.card_id,
            similarity: drift.similarity,
        }
    }
}

/// `(locale, card_id)` reference.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct EntryRef {
    pub locale: String,
    pub card_id: String,
}

#[derive(Debug, Default, Serialize)]
pub struct VerificationReport {
    /// Entries present on both sides and compared.
    pub checked: usize,
    pub drifts: Vec<Drift>,
    /// Recomputed entries absent from the stored files.
    pub missing: Vec<EntryRef>,
    /// Stored entries whose artwork no longer exists.
    pub stale: Vec<EntryRef>,
}

impl VerificationReport {
    /// Stale entries are reported but do not fail verification.
    pub fn passed(&self) -> bool {
        self.drifts.is_empty() && self.missing.is_empty()
    }

    pub fn errors(&self) -> impl Iterator<Item = CardMatchError> + '_ {
        self.drifts.iter().cloned().map(CardMatchError::from)
    }
}

/// Compare stored hashes against freshly recomputed ones.
///
/// Every entry is checked; a drift never stops the run.
#[instrument(skip_all, fields(threshold = threshold))]
pub fn verify(
    existing: &HashesByLocale,
    recomputed: &HashesByLocale,
    threshold: f64,
) -> VerificationReport {
    let empty = LocaleHashes::new();
    let mut report = VerificationReport::default();

    for (locale, fresh) in recomputed {
        let stored = existing.get(locale).unwrap_or(&empty);
        for (card_id, fp) in fresh {
            let Some(stored_fp) = stored.get(card_id) else {
                warn!(%locale, %card_id, "Card missing from stored hashes");
                report.missing.push(EntryRef {
                    locale: locale.clone(),
                    card_id: card_id.clone(),
                });
                continue;
            };
            report.checked += 1;
            let score = similarity(stored_fp, fp);
            if score < threshold {
                let drift = Drift {
                    locale: locale.clone(),
                    card_id: card_id.clone(),
                    similarity: score,
                };
                warn!(error = %CardMatchError::from(drift.clone()), "Reference hash drift");
                report.drifts.push(drift);
            }
        }
    }

    for (locale, stored) in existing {
        let fresh = recomputed.get(locale).unwrap_or(&empty);
        report.stale.extend(
            stored
                .keys()
                .filter(|card_id| !fresh.contains_key(*card_id))
                .map(|card_id| EntryRef {
                    locale: locale.clone(),
                    card_id: card_id.clone(),
                }),
        );
    }

    info!(
        checked = report.checked,
        drifts = report.drifts.len(),
        missing = report.missing.len(),
        stale = report.stale.len(),
        "Verification complete"
    );
    report
}
