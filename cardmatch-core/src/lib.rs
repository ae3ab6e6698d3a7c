//! CardMatch Core - perceptual hashing and card identification library
//!
//! This crate identifies trading cards in photographs by comparing a compact
//! perceptual fingerprint of each detected card against a precomputed
//! reference set covering every card in every published locale.
//!
//! # Features
//!
//! - 429-bit DCT fingerprints over a 48×48 RGB grid, stable across platforms
//! - Hamming similarity scoring and full-scan nearest-match ranking
//! - Per-locale reference hash files with default-locale fallback
//! - Single-flight reference loading from disk or HTTP (`network` feature)
//! - Offline generation and drift verification of reference hashes
//! - Pack pull-rate calculation
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use cardmatch_core::{CardHasher, DirectorySource, ImageSource, Pipeline, ReferenceStore};
//! use cardmatch_core::pipeline::DetectionRegion;
//!
//! # async fn example() -> cardmatch_core::Result<()> {
//! // One store per session, shared by every caller.
//! let store = ReferenceStore::new(Arc::new(DirectorySource::new("hashes")), "en-US");
//! let reference = store.reference_set("fr-FR").await?;
//!
//! let detections = vec![DetectionRegion::from_rect(40.0, 60.0, 630.0, 880.0, 92.0)];
//! let cards = Pipeline::new(CardHasher::default()).process_source(
//!     &ImageSource::path("photo.jpg"),
//!     &detections,
//!     &reference,
//!     "fr-FR",
//! )?;
//!
//! for card in &cards {
//!     if let Some(best) = card.matches.best() {
//!         println!("{} ({:.3})", best.card_id, best.similarity);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod catalogue;
pub mod config;
pub mod error;
pub mod generator;
pub mod hash;
pub mod matching;
pub mod pipeline;
pub mod pull_rate;
pub mod reference;

// Re-export main types for convenience
pub use catalogue::{ArtworkLocator, Catalogue, DirectoryArtwork};
pub use config::MatcherConfig;
pub use error::{CardMatchError, Result};
pub use generator::{
    build, verify, BuildReport, HashesByLocale, VerificationReport, VERIFY_SIMILARITY_THRESHOLD,
};
pub use hash::{
    hamming_distance, similarity, CardHasher, Fingerprint, ImageSampler, ImageSource,
    PerceptualEncoder, PixelGrid, PixelSampler, RawBufferSampler, FINGERPRINT_BITS,
    FREQUENCY_BLOCK, GRID_SIZE,
};
pub use matching::{resolve, CardMatch, MatchResult};
pub use pipeline::{CardDetector, DetectionRegion, ExtractedCard, Pipeline};
pub use pull_rate::{pull_rate, Pack, PullRateReport, Rarity};
pub use reference::{
    DirectorySource, FileHashCache, HashCache, HashSource, LocaleHashes, MemoryHashCache,
    ReferenceSet, ReferenceStore,
};

#[cfg(feature = "network")]
pub use reference::{HttpSource, HttpSourceConfig};
