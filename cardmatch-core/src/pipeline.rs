//! Detection-to-hash pipeline.
//!
//! Takes the regions an external detector found in a photograph, crops each
//! one, hashes it and resolves it against a reference set. Regions are
//! independent: they run in parallel and a failure in one never affects its
//! siblings.

use image::DynamicImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::{CardMatchError, Result};
use crate::hash::{load_image, CardHasher, Fingerprint, ImageSource};
use crate::matching::{resolve, MatchResult};
use crate::reference::ReferenceSet;

/// Detections scoring below this (0-100 scale) are ignored.
pub const DEFAULT_MIN_CONFIDENCE: f32 = 50.0;

/// Candidates kept per extracted card.
pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// Axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// A candidate card located by a detector: four corners in source-image
/// pixels and a confidence between 0 and 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRegion {
    pub corners: [Point; 4],
    pub confidence: f32,
}

impl DetectionRegion {
    /// Region covering the rectangle `(x, y, width, height)`.
    pub fn from_rect(x: f32, y: f32, width: f32, height: f32, confidence: f32) -> Self {
        Self {
            corners: [
                Point { x, y },
                Point { x: x + width, y },
                Point {
                    x: x + width,
                    y: y + height,
                },
                Point { x, y: y + height },
            ],
            confidence,
        }
    }

    /// Bounding box of the quadrilateral, clamped to a `width × height`
    /// image. Fails when nothing of the region lies inside the image.
    pub fn bounding_box(&self, width: u32, height: u32) -> Result<BoundingBox> {
        if self.corners.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(CardMatchError::InvalidRegion(
                "corner coordinates must be finite".into(),
            ));
        }
        let (min_x, max_x, min_y, max_y) = self.corners.iter().fold(
            (f32::MAX, f32::MIN, f32::MAX, f32::MIN),
            |(min_x, max_x, min_y, max_y), p| {
                (min_x.min(p.x), max_x.max(p.x), min_y.min(p.y), max_y.max(p.y))
            },
        );

        let clamp = |v: f32, limit: u32| v.clamp(0.0, limit as f32) as u32;
        let x0 = clamp(min_x.floor(), width);
        let x1 = clamp(max_x.ceil(), width);
        let y0 = clamp(min_y.floor(), height);
        let y1 = clamp(max_y.ceil(), height);

        if x1 <= x0 || y1 <= y0 {
            return Err(CardMatchError::InvalidRegion(format!(
                "region ({min_x}, {min_y})-({max_x}, {max_y}) is empty within {width}x{height}"
            )));
        }
        Ok(BoundingBox {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        })
    }
}

/// One processed detection.
///
/// A region that could not be cropped, hashed or resolved has no fingerprint,
/// an empty match list and the failure in `error`.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedCard {
    pub region: DetectionRegion,
    pub bounding_box: Option<BoundingBox>,
    #[serde(skip)]
    pub image: Option<DynamicImage>,
    pub fingerprint: Option<Fingerprint>,
    pub matches: MatchResult,
    pub error: Option<String>,
}

impl ExtractedCard {
    fn failed(
        region: DetectionRegion,
        bounding_box: Option<BoundingBox>,
        err: &CardMatchError,
    ) -> Self {
        Self {
            region,
            bounding_box,
            image: None,
            fingerprint: None,
            matches: MatchResult::default(),
            error: Some(err.to_string()),
        }
    }

    pub fn is_matched(&self) -> bool {
        !self.matches.is_empty()
    }
}

/// Locates candidate cards in a photograph. Inference itself lives outside
/// this crate.
pub trait CardDetector: Send + Sync {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<DetectionRegion>>;
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    hasher: CardHasher,
    min_confidence: f32,
    top_k: usize,
}

impl Pipeline {
    pub fn new(hasher: CardHasher) -> Self {
        Self {
            hasher,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn min_confidence(&self) -> f32 {
        self.min_confidence
    }

    /// Extract one card per detection at or above the confidence threshold,
    /// in detection order.
    #[instrument(skip_all, fields(detections = detections.len(), locale = %locale))]
    pub fn process(
        &self,
        image: &DynamicImage,
        detections: &[DetectionRegion],
        reference: &ReferenceSet,
        locale: &str,
    ) -> Vec<ExtractedCard> {
        let accepted: Vec<&DetectionRegion> = detections
            .iter()
            .filter(|region| region.confidence >= self.min_confidence)
            .collect();
        debug!(
            accepted = accepted.len(),
            min_confidence = self.min_confidence,
            "Filtered detections"
        );

        let cards: Vec<ExtractedCard> = accepted
            .into_par_iter()
            .map(|region| self.extract(image, region, reference, locale))
            .collect();

        let failed = cards.iter().filter(|card| card.error.is_some()).count();
        info!(extracted = cards.len(), failed, "Processed detection batch");
        cards
    }

    /// Load `source`, then [`process`](Self::process) it. Only a failure to
    /// load the source image itself is returned as an error.
    pub fn process_source(
        &self,
        source: &ImageSource,
        detections: &[DetectionRegion],
        reference: &ReferenceSet,
        locale: &str,
    ) -> Result<Vec<ExtractedCard>> {
        let image = load_image(source)?;
        Ok(self.process(&image, detections, reference, locale))
    }

    /// Run `detector` over `source` and process whatever it finds.
    pub fn detect_and_process(
        &self,
        detector: &dyn CardDetector,
        source: &ImageSource,
        reference: &ReferenceSet,
        locale: &str,
    ) -> Result<Vec<ExtractedCard>> {
        let image = load_image(source)?;
        let detections = detector.detect(&image)?;
        Ok(self.process(&image, &detections, reference, locale))
    }

    fn extract(
        &self,
        image: &DynamicImage,
        region: &DetectionRegion,
        reference: &ReferenceSet,
        locale: &str,
    ) -> ExtractedCard {
        let bbox = match region.bounding_box(image.width(), image.height()) {
            Ok(bbox) => bbox,
            Err(e) => {
                warn!(error = %e, confidence = region.confidence, "Skipping detection region");
                return ExtractedCard::failed(region.clone(), None, &e);
            }
        };

        let crop = image.crop_imm(bbox.x, bbox.y, bbox.width, bbox.height);
        let fingerprint = match self.hasher.hash_image(&crop) {
            Ok(fp) => fp,
            Err(e) => {
                warn!(error = %e, ?bbox, "Failed to hash detection region");
                return ExtractedCard::failed(region.clone(), Some(bbox), &e);
            }
        };

        let mut matches = resolve(&fingerprint, reference, locale);
        matches.truncate(self.top_k);
        ExtractedCard {
            region: region.clone(),
            bounding_box: Some(bbox),
            image: Some(crop),
            fingerprint: Some(fingerprint),
            matches,
            error: None,
        }
    }
}
