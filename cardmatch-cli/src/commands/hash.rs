//! Hash command implementation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cardmatch_core::{CardHasher, Fingerprint};
use serde::Serialize;
use tracing::info;

use crate::utils::print_json;

#[derive(Serialize)]
struct HashOutput<'a> {
    file: String,
    fingerprint: &'a Fingerprint,
    hex: String,
    bits: usize,
}

/// Hash an image file, reading it with a "Failed to read" context so a
/// missing file exits with the input error code.
pub fn hash_file(hasher: &CardHasher, file: &Path) -> Result<Fingerprint> {
    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to read file: {}", file.display()))?;
    info!(path = %file.display(), bytes = bytes.len(), "Read image");
    hasher
        .hash_bytes(&bytes)
        .with_context(|| format!("Failed to decode image: {}", file.display()))
}

/// Execute the hash command.
pub fn execute(file: PathBuf, json: bool) -> Result<()> {
    let fingerprint = hash_file(&CardHasher::default(), &file)?;

    if json {
        print_json(&HashOutput {
            file: file.display().to_string(),
            fingerprint: &fingerprint,
            hex: fingerprint.to_hex(),
            bits: cardmatch_core::FINGERPRINT_BITS,
        })
    } else {
        println!("{}", fingerprint.to_base64());
        Ok(())
    }
}
