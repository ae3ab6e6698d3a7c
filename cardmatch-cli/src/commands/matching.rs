//! Match command implementation.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use cardmatch_core::{
    resolve, CardHasher, CardMatch, DetectionRegion, DirectorySource, HashSource, ImageSource,
    MatchResult, MatcherConfig, Pipeline, ReferenceStore,
};
use colored::Colorize;
use serde::Serialize;
use tracing::info;

use crate::utils::{print_json, read_json};

pub struct MatchArgs {
    pub file: PathBuf,
    pub hashes: Option<PathBuf>,
    pub locale: Option<String>,
    pub default_locale: Option<String>,
    pub detections: Option<PathBuf>,
    pub top_k: Option<usize>,
    pub min_confidence: Option<f32>,
    pub min_similarity: Option<f64>,
    pub json: bool,
}

/// One identified (or unidentified) card in the output.
#[derive(Serialize)]
struct CardOutput {
    region: Option<DetectionRegion>,
    /// `None` when no similarity threshold was given.
    identified: Option<bool>,
    candidates: MatchResult,
    error: Option<String>,
}

impl CardOutput {
    fn new(
        region: Option<DetectionRegion>,
        candidates: MatchResult,
        error: Option<String>,
        min_similarity: Option<f64>,
    ) -> Self {
        let identified = min_similarity.map(|s| candidates.confident(s).is_some());
        Self {
            region,
            identified,
            candidates,
            error,
        }
    }
}

/// Execute the match command.
pub async fn execute(args: MatchArgs) -> Result<()> {
    let config = MatcherConfig::from_env();
    let default_locale = args
        .default_locale
        .unwrap_or_else(|| config.default_locale.clone());
    let locale = args.locale.unwrap_or_else(|| default_locale.clone());
    let top_k = args.top_k.unwrap_or(config.top_k).max(1);

    let source: Arc<dyn HashSource> = match &args.hashes {
        Some(dir) => Arc::new(DirectorySource::new(dir.clone())),
        None => config.hash_source()?,
    };
    let origin = source.describe();

    let bytes = std::fs::read(&args.file)
        .with_context(|| format!("Failed to read file: {}", args.file.display()))?;
    let detections: Option<Vec<DetectionRegion>> = args
        .detections
        .as_deref()
        .map(|path| read_json(path, "detections"))
        .transpose()?;

    let store = ReferenceStore::new(source, default_locale);
    let reference = store
        .reference_set(&locale)
        .await
        .with_context(|| format!("Failed to load reference hashes from {origin}"))?;
    info!(%locale, cards = reference.len(), %origin, "Loaded reference set");

    let hasher = CardHasher::default();
    let cards = match detections {
        Some(detections) => {
            let pipeline = Pipeline::new(hasher)
                .with_min_confidence(args.min_confidence.unwrap_or(config.min_confidence))
                .with_top_k(top_k);
            pipeline
                .process_source(&ImageSource::Encoded(bytes), &detections, &reference, &locale)
                .with_context(|| format!("Failed to decode image: {}", args.file.display()))?
                .into_iter()
                .map(|card| {
                    CardOutput::new(
                        Some(card.region),
                        card.matches,
                        card.error,
                        args.min_similarity,
                    )
                })
                .collect()
        }
        None => {
            let query = hasher
                .hash_bytes(&bytes)
                .with_context(|| format!("Failed to decode image: {}", args.file.display()))?;
            let mut matches = resolve(&query, &reference, &locale);
            matches.truncate(top_k);
            vec![CardOutput::new(None, matches, None, args.min_similarity)]
        }
    };

    if args.json {
        return print_json(&cards);
    }
    print_cards(&cards);
    Ok(())
}

fn print_cards(cards: &[CardOutput]) {
    if cards.is_empty() {
        println!("{}", "No detections above the confidence threshold".yellow());
        return;
    }
    for (index, card) in cards.iter().enumerate() {
        let status = match (card.identified, &card.error) {
            (_, Some(_)) => "FAILED".red().bold(),
            (Some(true), None) => "IDENTIFIED".green().bold(),
            (Some(false), None) => "UNCERTAIN".yellow().bold(),
            (None, None) => "CANDIDATES".cyan().bold(),
        };
        let confidence = card
            .region
            .as_ref()
            .map(|region| format!(" (detection {:.0}%)", region.confidence))
            .unwrap_or_default();
        println!("Card {}{}: {}", index + 1, confidence, status);

        if let Some(error) = &card.error {
            println!("   {}", error.red());
            continue;
        }
        for (rank, CardMatch { card_id, similarity }) in card.candidates.ranked().iter().enumerate()
        {
            println!("   {}. {:<12} {:.4}", rank + 1, card_id, similarity);
        }
    }
}
