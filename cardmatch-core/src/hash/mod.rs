//! Perceptual hashing for card artwork.
//!
//! The pipeline is split the same way on every platform:
//!
//! - **Sampling**: a [`PixelSampler`] backend turns an [`ImageSource`] into a
//!   fixed 48×48 [`PixelGrid`]. Interactive callers use [`ImageSampler`];
//!   batch tooling that already holds decoded pixels uses [`RawBufferSampler`].
//! - **Encoding**: [`PerceptualEncoder`] runs a per-channel DCT-II and emits a
//!   packed [`Fingerprint`].
//! - **Scoring**: [`similarity`] turns the Hamming distance between two
//!   fingerprints into a score in `[0, 1]`.
//!
//! Grid size and frequency block size are fixed by compatibility with every
//! stored reference hash and client cache. Changing either one invalidates all
//! of them.

pub mod encoder;
pub mod fingerprint;
pub mod hasher;
pub mod sampler;
pub mod similarity;

pub use encoder::PerceptualEncoder;
pub use fingerprint::{
    Fingerprint, BITS_PER_CHANNEL, FINGERPRINT_BITS, FINGERPRINT_WORDS, FREQUENCY_BLOCK,
    GRID_SIZE,
};
pub use hasher::CardHasher;
pub use sampler::{
    load_image, ImageSampler, ImageSource, PixelGrid, PixelLayout, PixelSampler, RawBufferSampler,
    RawImage,
};
pub use similarity::{hamming_distance, similarity, Comparison};
