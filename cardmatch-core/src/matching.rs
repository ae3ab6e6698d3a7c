//! Nearest-match resolution against a reference set.
//!
//! Every query is a full linear scan. Reference sets hold thousands of cards,
//! so no index structure is kept.

use serde::Serialize;
use tracing::debug;

use crate::hash::{similarity, Fingerprint};
use crate::reference::ReferenceSet;

/// One ranked candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardMatch {
    pub card_id: String,
    pub similarity: f64,
}

/// Every reference card ranked by non-increasing similarity to a query.
///
/// Cards with equal similarity keep catalogue order. That order carries no
/// meaning beyond being stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MatchResult {
    ranked: Vec<CardMatch>,
}

impl MatchResult {
    pub fn ranked(&self) -> &[CardMatch] {
        &self.ranked
    }

    pub fn into_ranked(self) -> Vec<CardMatch> {
        self.ranked
    }

    /// Highest-scoring card, if the reference set was not empty.
    pub fn best(&self) -> Option<&CardMatch> {
        self.ranked.first()
    }

    /// Bounded prefix of the ranking, for manual correction.
    pub fn top_k(&self, k: usize) -> &[CardMatch] {
        &self.ranked[..k.min(self.ranked.len())]
    }

    /// Best match when it reaches `threshold`. What counts as confident is
    /// the caller's decision.
    pub fn confident(&self, threshold: f64) -> Option<&CardMatch> {
        self.best().filter(|m| m.similarity >= threshold)
    }

    /// Drop every candidate after the first `k`.
    pub fn truncate(&mut self, k: usize) {
        self.ranked.truncate(k);
    }

    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }
}

/// Rank every card of `reference` against `query` for `locale`.
///
/// Each card uses its `locale` fingerprint, or the default-locale one when
/// the locale has none. An empty reference set yields an empty result.
pub fn resolve(query: &Fingerprint, reference: &ReferenceSet, locale: &str) -> MatchResult {
    let mut ranked: Vec<CardMatch> = reference
        .candidates(locale)
        .map(|(card_id, fingerprint)| CardMatch {
            card_id: card_id.to_string(),
            similarity: similarity(query, fingerprint),
        })
        .collect();

    // sort_by is stable: ties stay in catalogue order.
    ranked.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));

    if let Some(best) = ranked.first() {
        debug!(
            locale,
            candidates = ranked.len(),
            best = %best.card_id,
            similarity = best.similarity,
            "Resolved query fingerprint"
        );
    }
    MatchResult { ranked }
}
