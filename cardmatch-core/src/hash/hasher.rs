//! Sampler + encoder bundle.
//!
//! ```no_run
//! use cardmatch_core::hash::{CardHasher, ImageSource};
//!
//! let hasher = CardHasher::default();
//! let a = hasher.hash(&ImageSource::path("a.webp")).unwrap();
//! let b = hasher.hash(&ImageSource::path("b.webp")).unwrap();
//! println!("similarity {:.3}", a.similarity(&b));
//! ```

use std::path::Path;
use std::sync::Arc;

use image::DynamicImage;

use super::encoder::PerceptualEncoder;
use super::fingerprint::Fingerprint;
use super::sampler::{ImageSampler, ImageSource, PixelSampler};
use crate::error::Result;

/// Long-lived hashing component. Cheap to clone; the sampler is shared.
#[derive(Clone)]
pub struct CardHasher {
    sampler: Arc<dyn PixelSampler>,
    encoder: PerceptualEncoder,
}

impl CardHasher {
    pub fn new(sampler: Arc<dyn PixelSampler>) -> Self {
        Self {
            sampler,
            encoder: PerceptualEncoder::new(),
        }
    }

    pub fn hash(&self, source: &ImageSource) -> Result<Fingerprint> {
        let grid = self.sampler.sample(source)?;
        self.encoder.encode(&grid)
    }

    pub fn hash_bytes(&self, bytes: &[u8]) -> Result<Fingerprint> {
        self.hash(&ImageSource::Encoded(bytes.to_vec()))
    }

    pub fn hash_path(&self, path: impl AsRef<Path>) -> Result<Fingerprint> {
        self.hash(&ImageSource::path(path))
    }

    pub fn hash_image(&self, image: &DynamicImage) -> Result<Fingerprint> {
        let grid = self.sampler.sample_image(image)?;
        self.encoder.encode(&grid)
    }
}

impl Default for CardHasher {
    fn default() -> Self {
        Self::new(Arc::new(ImageSampler::new()))
    }
}

impl std::fmt::Debug for CardHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardHasher")
            .field("grid_size", &self.encoder.grid_size())
            .field("bits", &self.encoder.bit_len())
            .finish()
    }
}
