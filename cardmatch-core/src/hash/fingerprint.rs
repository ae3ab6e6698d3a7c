//! Packed-bit fingerprint representation and its wire format.
//!
//! Bits are packed into 32-bit words, least-significant bit first. On the wire
//! the words are written little-endian and base64-encoded, which is exactly
//! the byte layout of the reference hash files.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CardMatchError, Result};

/// Side length of the sampled pixel grid.
pub const GRID_SIZE: usize = 48;

/// Side length of the retained low-frequency DCT block.
pub const FREQUENCY_BLOCK: usize = 12;

/// Bits contributed by one color channel (the DC term is dropped).
pub const BITS_PER_CHANNEL: usize = FREQUENCY_BLOCK * FREQUENCY_BLOCK - 1;

/// Total bits in a fingerprint: R, G and B channels concatenated.
pub const FINGERPRINT_BITS: usize = 3 * BITS_PER_CHANNEL;

/// Number of 32-bit words a standard fingerprint occupies.
pub const FINGERPRINT_WORDS: usize = FINGERPRINT_BITS.div_ceil(32);

/// Immutable perceptual hash of one image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    words: Vec<u32>,
}

impl Fingerprint {
    /// Pack a bit sequence, zero-padding the final word.
    pub fn from_bits<I>(bits: I) -> Self
    where
        I: IntoIterator<Item = bool>,
    {
        let mut words = Vec::with_capacity(FINGERPRINT_WORDS);
        for (i, bit) in bits.into_iter().enumerate() {
            let word = i / 32;
            if word == words.len() {
                words.push(0);
            }
            if bit {
                words[word] |= 1 << (i % 32);
            }
        }
        Self { words }
    }

    /// Wrap already-packed words.
    pub fn from_words(words: Vec<u32>) -> Self {
        Self { words }
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Read bit `index`, or `None` past the end of the buffer.
    pub fn bit(&self, index: usize) -> Option<bool> {
        self.words
            .get(index / 32)
            .map(|word| (word >> (index % 32)) & 1 == 1)
    }

    /// Whether this fingerprint has the length produced by the current encoder.
    pub fn is_standard_size(&self) -> bool {
        self.words.len() == FINGERPRINT_WORDS
    }

    /// Little-endian byte view of the packed words.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    /// Rebuild from little-endian bytes. The length must be a multiple of 4.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() % 4 != 0 {
            return Err(CardMatchError::HashFormat(format!(
                "buffer length {} is not a multiple of 4",
                bytes.len()
            )));
        }
        let words = bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Self { words })
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.to_bytes())
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| CardMatchError::HashFormat(format!("invalid base64: {e}")))?;
        Self::from_bytes(&bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Similarity score against another fingerprint, see [`super::similarity`].
    pub fn similarity(&self, other: &Self) -> f64 {
        super::similarity(self, other)
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Fingerprint::from_base64(&encoded).map_err(serde::de::Error::custom)
    }
}
