//! Compare command implementation.

use std::path::{Path, PathBuf};

use anyhow::Result;
use cardmatch_core::{hamming_distance, CardHasher, Fingerprint, FINGERPRINT_BITS};
use colored::Colorize;
use tracing::debug;

use super::hash::hash_file;

/// An argument is an image path, or a base64 fingerprint when no such file
/// exists.
fn fingerprint_for(hasher: &CardHasher, arg: &Path) -> Result<Fingerprint> {
    if !arg.exists() {
        if let Some(fingerprint) = arg
            .to_str()
            .and_then(|text| Fingerprint::from_base64(text).ok())
        {
            debug!("Argument parsed as base64 fingerprint");
            return Ok(fingerprint);
        }
    }
    hash_file(hasher, arg)
}

/// Execute the compare command.
pub fn execute(first: PathBuf, second: PathBuf, quiet: bool) -> Result<()> {
    let hasher = CardHasher::default();
    let a = fingerprint_for(&hasher, &first)?;
    let b = fingerprint_for(&hasher, &second)?;

    let comparison = hamming_distance(&a, &b);
    let score = comparison.similarity();

    if quiet {
        println!("{score:.4}");
        return Ok(());
    }

    let verdict = if score >= cardmatch_core::VERIFY_SIMILARITY_THRESHOLD {
        "same card".green().bold()
    } else {
        "different".yellow()
    };
    println!("   {} {:.4} ({})", "Similarity:".dimmed(), score, verdict);
    println!(
        "   {} {}/{} bits",
        "Distance:".dimmed(),
        comparison.distance,
        FINGERPRINT_BITS
    );
    if comparison.length_mismatch {
        println!(
            "   {} fingerprints differ in length, compared {} words",
            "Warning:".yellow(),
            comparison.compared_words
        );
    }
    Ok(())
}
