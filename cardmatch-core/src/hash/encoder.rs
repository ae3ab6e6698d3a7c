//! DCT-based fingerprint encoder.
//!
//! # Algorithm
//!
//! For each color channel of a 48×48 grid:
//!
//! 1. Compute the 2D DCT-II restricted to the lowest 12×12 frequencies, with
//!    orthonormal scaling: `c(0) = 1/√2`, `c(k) = 1` otherwise, overall `2/S`.
//! 2. Drop the DC coefficient.
//! 3. Emit `1` for every remaining coefficient strictly greater than the mean
//!    of the 143 retained coefficients, `0` otherwise.
//!
//! Coefficients are visited row-major (vertical frequency outer, horizontal
//! frequency inner) and channels are concatenated R, G, B.
//!
//! # Numerical stability
//!
//! A coefficient lying within floating-point noise of the channel mean can
//! land on either side of the comparison depending on summation order or
//! float width. This is a known fragility of the format. The strict `>` rule
//! is kept as-is: rounding or tie-breaking would change the bit layout and
//! break every stored reference hash.

use std::sync::Arc;

use rustdct::{DctPlanner, TransformType2And3};

use super::fingerprint::{Fingerprint, FREQUENCY_BLOCK, GRID_SIZE};
use super::sampler::PixelGrid;
use crate::error::{CardMatchError, Result};

/// Planned DCT for one grid/block size pair.
#[derive(Clone)]
pub struct PerceptualEncoder {
    grid_size: usize,
    block: usize,
    dct: Arc<dyn TransformType2And3<f64>>,
    scratch_len: usize,
    /// `c(k)` normalization per frequency index.
    norm: Vec<f64>,
}

impl PerceptualEncoder {
    pub fn new() -> Self {
        Self::planned(GRID_SIZE, FREQUENCY_BLOCK)
    }

    /// Encoder for non-standard dimensions. Fingerprints produced this way are
    /// not comparable with reference hashes.
    ///
    /// `block` is capped at `grid_size` and must keep at least one AC
    /// coefficient, so both must be at least 2.
    pub fn with_dimensions(grid_size: usize, block: usize) -> Result<Self> {
        let block = block.min(grid_size);
        if block < 2 {
            return Err(CardMatchError::HashFormat(format!(
                "frequency block must be at least 2x2, got {block}x{block}"
            )));
        }
        Ok(Self::planned(grid_size, block))
    }

    fn planned(grid_size: usize, block: usize) -> Self {
        let dct = DctPlanner::new().plan_dct2(grid_size);
        let scratch_len = dct.get_scratch_len();
        let norm = (0..block)
            .map(|k| if k == 0 { 1.0 / 2.0_f64.sqrt() } else { 1.0 })
            .collect();

        Self {
            grid_size,
            block,
            dct,
            scratch_len,
            norm,
        }
    }

    pub fn grid_size(&self) -> usize {
        self.grid_size
    }

    /// Number of bits this encoder emits per fingerprint.
    pub fn bit_len(&self) -> usize {
        3 * (self.block * self.block - 1)
    }

    /// Encode a pixel grid into a fingerprint.
    pub fn encode(&self, grid: &PixelGrid) -> Result<Fingerprint> {
        if grid.size() != self.grid_size {
            return Err(CardMatchError::HashFormat(format!(
                "grid is {0}x{0}, encoder expects {1}x{1}",
                grid.size(),
                self.grid_size
            )));
        }

        let mut bits = Vec::with_capacity(self.bit_len());
        for plane in grid.channels() {
            let coefficients = self.low_frequencies(plane);
            let ac = &coefficients[1..];
            let mean = ac.iter().sum::<f64>() / ac.len() as f64;
            bits.extend(ac.iter().map(|&c| c > mean));
        }

        Ok(Fingerprint::from_bits(bits))
    }

    /// Lowest `block × block` DCT-II coefficients of one plane, row-major.
    pub fn low_frequencies(&self, plane: &[u8]) -> Vec<f64> {
        let s = self.grid_size;
        let f = self.block;
        let mut scratch = vec![0.0f64; self.scratch_len];

        // Rows
        let mut rows: Vec<f64> = plane.iter().map(|&p| p as f64).collect();
        for row in rows.chunks_mut(s) {
            self.dct.process_dct2_with_scratch(row, &mut scratch);
        }

        // Columns, only for the retained horizontal frequencies
        let scale = 2.0 / s as f64;
        let mut column = vec![0.0f64; s];
        let mut out = vec![0.0f64; f * f];
        for u in 0..f {
            for (y, value) in column.iter_mut().enumerate() {
                *value = rows[y * s + u];
            }
            self.dct.process_dct2_with_scratch(&mut column, &mut scratch);
            for v in 0..f {
                out[v * f + u] = column[v] * scale * self.norm[u] * self.norm[v];
            }
        }
        out
    }
}

impl std::fmt::Debug for PerceptualEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerceptualEncoder")
            .field("grid_size", &self.grid_size)
            .field("block", &self.block)
            .finish()
    }
}

impl Default for PerceptualEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::fingerprint::FINGERPRINT_BITS;

    fn grid_from_fn(f: impl Fn(usize, usize) -> [u8; 3]) -> PixelGrid {
        let n = GRID_SIZE * GRID_SIZE;
        let (mut r, mut g, mut b) = (Vec::with_capacity(n), Vec::with_capacity(n), Vec::with_capacity(n));
        for y in 0..GRID_SIZE {
            for x in 0..GRID_SIZE {
                let [pr, pg, pb] = f(x, y);
                r.push(pr);
                g.push(pg);
                b.push(pb);
            }
        }
        PixelGrid::new(GRID_SIZE, r, g, b).unwrap()
    }

    #[test]
    fn test_flat_plane_has_only_dc_energy() {
        let encoder = PerceptualEncoder::new();
        let coefficients = encoder.low_frequencies(&vec![100u8; GRID_SIZE * GRID_SIZE]);
        // DC = (2/S) · (1/2) · S² · 100 = S · 100
        assert!((coefficients[0] - 100.0 * GRID_SIZE as f64).abs() < 1e-6);
        for &c in &coefficients[1..] {
            assert!(c.abs() < 1e-6, "unexpected AC energy {c}");
        }
    }

    #[test]
    fn test_horizontal_ramp_lands_in_first_row() {
        let encoder = PerceptualEncoder::new();
        let plane: Vec<u8> = (0..GRID_SIZE * GRID_SIZE)
            .map(|i| ((i % GRID_SIZE) * 5) as u8)
            .collect();
        let coefficients = encoder.low_frequencies(&plane);
        // A ramp along x only excites horizontal frequencies (v = 0).
        assert!(coefficients[1].abs() > 100.0);
        assert!(coefficients[FREQUENCY_BLOCK].abs() < 1e-6);
    }

    #[test]
    fn test_encode_emits_standard_length() {
        let grid = grid_from_fn(|x, y| [(x * 5) as u8, (y * 5) as u8, ((x + y) * 2) as u8]);
        let fp = PerceptualEncoder::new().encode(&grid).unwrap();
        assert!(fp.is_standard_size());
        assert_eq!(PerceptualEncoder::new().bit_len(), FINGERPRINT_BITS);
        for i in FINGERPRINT_BITS..FINGERPRINT_BITS.div_ceil(32) * 32 {
            assert_eq!(fp.bit(i), Some(false), "padding bit {i} must be zero");
        }
    }

    #[test]
    fn test_encode_is_deterministic() {
        let grid = grid_from_fn(|x, y| [((x * y) % 256) as u8, (x * 3) as u8, (y * 4) as u8]);
        let encoder = PerceptualEncoder::new();
        assert_eq!(encoder.encode(&grid).unwrap(), encoder.encode(&grid).unwrap());
    }

    #[test]
    fn test_flat_image_sets_no_bits() {
        // All AC coefficients are ~0; nothing is strictly above the mean by
        // more than float noise, and a perfectly flat input yields exact zeros.
        let grid = grid_from_fn(|_, _| [0, 0, 0]);
        let fp = PerceptualEncoder::new().encode(&grid).unwrap();
        assert!(fp.words().iter().all(|&w| w == 0));
    }

    #[test]
    fn test_rejects_mismatched_grid() {
        let grid = PixelGrid::new(4, vec![0; 16], vec![0; 16], vec![0; 16]).unwrap();
        assert!(matches!(
            PerceptualEncoder::new().encode(&grid),
            Err(CardMatchError::HashFormat(_))
        ));
    }

    #[test]
    fn test_matches_direct_dct_sum() {
        let s = GRID_SIZE;
        let plane: Vec<u8> = (0..s * s).map(|i| ((i * 37 + i / s * 11) % 251) as u8).collect();
        let coefficients = PerceptualEncoder::new().low_frequencies(&plane);

        let c = |k: usize| if k == 0 { 1.0 / 2.0_f64.sqrt() } else { 1.0 };
        let basis = |k: usize, n: usize| {
            ((2 * n + 1) as f64 * k as f64 * std::f64::consts::PI / (2 * s) as f64).cos()
        };
        let direct = |u: usize, v: usize| {
            let mut sum = 0.0;
            for y in 0..s {
                for x in 0..s {
                    sum += plane[y * s + x] as f64 * basis(u, x) * basis(v, y);
                }
            }
            sum * 2.0 / s as f64 * c(u) * c(v)
        };
        for (u, v) in [(0, 0), (1, 0), (0, 1), (3, 7), (11, 11)] {
            let expected = direct(u, v);
            let got = coefficients[v * FREQUENCY_BLOCK + u];
            assert!((got - expected).abs() < 1e-6, "({u}, {v}): {got} vs {expected}");
        }
    }

    #[test]
    fn test_rejects_degenerate_block() {
        assert!(matches!(
            PerceptualEncoder::with_dimensions(8, 0),
            Err(CardMatchError::HashFormat(_))
        ));
        assert!(PerceptualEncoder::with_dimensions(8, 1).is_err());
        assert!(PerceptualEncoder::with_dimensions(1, 4).is_err());
        assert!(PerceptualEncoder::with_dimensions(2, 4).is_ok());
    }

    #[test]
    fn test_custom_dimensions() {
        let encoder = PerceptualEncoder::with_dimensions(8, 4).unwrap();
        let grid = PixelGrid::new(8, vec![1; 64], vec![2; 64], vec![3; 64]).unwrap();
        assert_eq!(encoder.bit_len(), 45);
        assert_eq!(encoder.encode(&grid).unwrap().words().len(), 2);
    }
}
