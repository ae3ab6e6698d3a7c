//! Hamming distance and normalized similarity between fingerprints.

use tracing::warn;

use super::fingerprint::{Fingerprint, FINGERPRINT_BITS};

/// Raw outcome of comparing two packed buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Comparison {
    /// Number of differing bits over the compared prefix.
    pub distance: u32,
    /// Number of 32-bit words actually compared.
    pub compared_words: usize,
    /// The buffers had different lengths; only the common prefix was compared.
    /// This indicates fingerprints produced with different parameters or a
    /// corrupted reference entry.
    pub length_mismatch: bool,
}

impl Comparison {
    /// `1 − distance / FINGERPRINT_BITS`, clamped to `[0, 1]`.
    pub fn similarity(&self) -> f64 {
        (1.0 - self.distance as f64 / FINGERPRINT_BITS as f64).clamp(0.0, 1.0)
    }
}

/// Word-wise XOR + popcount over the shorter of the two buffers.
pub fn hamming_distance(a: &Fingerprint, b: &Fingerprint) -> Comparison {
    let (left, right) = (a.words(), b.words());
    let compared_words = left.len().min(right.len());
    let length_mismatch = left.len() != right.len();

    if length_mismatch {
        warn!(
            left_words = left.len(),
            right_words = right.len(),
            "Fingerprint length mismatch, comparing common prefix only"
        );
    }

    let distance = left[..compared_words]
        .iter()
        .zip(&right[..compared_words])
        .map(|(x, y)| (x ^ y).count_ones())
        .sum();

    Comparison {
        distance,
        compared_words,
        length_mismatch,
    }
}

/// Normalized similarity of two fingerprints.
///
/// Symmetric, and exactly `1.0` for identical fingerprints.
pub fn similarity(a: &Fingerprint, b: &Fingerprint) -> f64 {
    hamming_distance(a, b).similarity()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::fingerprint::FINGERPRINT_WORDS;

    fn words(pattern: u32) -> Fingerprint {
        Fingerprint::from_words(vec![pattern; FINGERPRINT_WORDS])
    }

    #[test]
    fn test_identical_is_one() {
        let fp = words(0xA5A5_5A5A);
        assert_eq!(similarity(&fp, &fp), 1.0);
        assert_eq!(hamming_distance(&fp, &fp).distance, 0);
    }

    #[test]
    fn test_single_bit() {
        let a = words(0);
        let mut w = vec![0u32; FINGERPRINT_WORDS];
        w[3] = 1 << 7;
        let b = Fingerprint::from_words(w);
        assert_eq!(hamming_distance(&a, &b).distance, 1);
        let expected = 1.0 - 1.0 / FINGERPRINT_BITS as f64;
        assert!((similarity(&a, &b) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_symmetric_and_bounded() {
        let a = Fingerprint::from_bits((0..FINGERPRINT_BITS).map(|i| i % 3 == 0));
        let b = Fingerprint::from_bits((0..FINGERPRINT_BITS).map(|i| i % 5 == 0));
        let ab = similarity(&a, &b);
        assert_eq!(ab, similarity(&b, &a));
        assert!((0.0..=1.0).contains(&ab));
    }

    #[test]
    fn test_complement_of_valid_bits_is_zero() {
        let a = Fingerprint::from_bits(std::iter::repeat(false).take(FINGERPRINT_BITS));
        let b = Fingerprint::from_bits(std::iter::repeat(true).take(FINGERPRINT_BITS));
        assert_eq!(hamming_distance(&a, &b).distance, FINGERPRINT_BITS as u32);
        assert_eq!(similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_length_mismatch_compares_prefix() {
        let short = Fingerprint::from_words(vec![0xFFFF_FFFF; 2]);
        let long = Fingerprint::from_words(vec![0xFFFF_FFFF, 0, 0xFFFF_FFFF]);
        let comparison = hamming_distance(&short, &long);
        assert!(comparison.length_mismatch);
        assert_eq!(comparison.compared_words, 2);
        assert_eq!(comparison.distance, 32);
    }

    #[test]
    fn test_oversized_buffers_stay_in_range() {
        let a = Fingerprint::from_words(vec![0; 32]);
        let b = Fingerprint::from_words(vec![u32::MAX; 32]);
        assert_eq!(similarity(&a, &b), 0.0);
    }
}
