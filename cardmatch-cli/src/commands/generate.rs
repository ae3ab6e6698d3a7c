//! Generate command implementation.
//!
//! Without `--verify` the reference hash files are (re)written. With
//! `--verify` nothing is written: the stored files are compared against a
//! fresh build and any drift fails the run.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use cardmatch_core::config::parse_list;
use cardmatch_core::generator::{load_hash_files, write_hash_files, BuildFailure};
use cardmatch_core::reference::{hash_file_name, CatalogueHasher};
use cardmatch_core::{
    build, verify, BuildReport, CardHasher, Catalogue, DirectoryArtwork, FileHashCache,
    MatcherConfig, VerificationReport,
};
use colored::Colorize;
use tracing::{info, warn};

pub struct GenerateArgs {
    pub catalogue: PathBuf,
    pub images: PathBuf,
    pub out: PathBuf,
    pub locales: Option<String>,
    pub verify: bool,
    pub threshold: f64,
    pub cache: Option<PathBuf>,
}

/// Execute the generate command.
pub fn execute(args: GenerateArgs, quiet: bool) -> Result<()> {
    let catalogue = Catalogue::load(&args.catalogue)
        .with_context(|| format!("Failed to read catalogue: {}", args.catalogue.display()))?;
    if !args.images.is_dir() {
        bail!("Failed to read artwork directory: {}", args.images.display());
    }

    let config = MatcherConfig::from_env();
    let locales = match &args.locales {
        Some(list) => parse_list(list),
        None => config.locales,
    };
    if locales.is_empty() {
        bail!("No locales given");
    }
    info!(cards = catalogue.len(), locales = ?locales, "Loaded catalogue");

    let artwork = DirectoryArtwork::new(&args.images);
    let hasher = CardHasher::default();

    if args.verify {
        let report = build(&catalogue, &locales, &artwork, &hasher);
        log_failures(&report.failures);
        let stored = load_hash_files(&args.out, &locales)
            .with_context(|| format!("Failed to read hash files in {}", args.out.display()))?;
        let verification = verify(&stored, &report.hashes, args.threshold);
        if !quiet {
            print_verification(&verification, &report.failures);
        }
        if !verification.passed() || !report.failures.is_empty() {
            bail!(
                "Verification failed: {} drifted, {} missing, {} unreadable",
                verification.drifts.len(),
                verification.missing.len(),
                report.failures.len()
            );
        }
        return Ok(());
    }

    let report = match args.cache.as_ref().or(config.cache_path.as_ref()) {
        Some(dir) => build_cached(dir, &catalogue, &locales, &artwork, &hasher)?,
        None => build(&catalogue, &locales, &artwork, &hasher),
    };
    log_failures(&report.failures);

    let written = write_hash_files(&args.out, &report.hashes)
        .with_context(|| format!("Failed to write hash files to {}", args.out.display()))?;
    info!(files = written.len(), hashes = report.hashed(), "Wrote reference hashes");

    if !quiet {
        println!();
        println!("{}", "Reference hashes written".green().bold());
        println!("   {} {}", "Cards:".dimmed(), catalogue.len());
        println!("   {} {}", "Hashed:".dimmed(), report.hashed());
        println!("   {} {}", "No artwork:".dimmed(), report.skipped);
        if !report.failures.is_empty() {
            println!(
                "   {} {}",
                "Unreadable:".dimmed(),
                report.failures.len().to_string().yellow()
            );
        }
        for (locale, hashes) in &report.hashes {
            println!("   {:>6} {} cards", locale.cyan(), hashes.len());
        }
        println!("   {} {}", "Output:".dimmed(), args.out.display());
    }
    Ok(())
}

/// Build through one durable cache file per locale, hashing only what the
/// caches lack.
fn build_cached(
    dir: &Path,
    catalogue: &Catalogue,
    locales: &[String],
    artwork: &DirectoryArtwork,
    hasher: &CardHasher,
) -> Result<BuildReport> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to write cache directory: {}", dir.display()))?;

    let mut report = BuildReport::default();
    for locale in locales {
        let cache = FileHashCache::open(dir.join(hash_file_name(locale)?))
            .with_context(|| format!("Failed to read hash cache for {locale}"))?;
        let synced = CatalogueHasher::new(&cache, hasher, artwork)
            .sync(catalogue, locale)
            .with_context(|| format!("Failed to write hash cache for {locale}"))?;
        info!(
            %locale,
            reused = synced.reused,
            computed = synced.computed,
            "Synced hash cache"
        );

        report.skipped += synced.missing_artwork.len();
        report
            .failures
            .extend(synced.failed.into_iter().map(|(card_id, reason)| BuildFailure {
                locale: locale.clone(),
                card_id,
                reason,
            }));
        report.hashes.insert(locale.clone(), synced.hashes);
    }
    Ok(report)
}

fn log_failures(failures: &[BuildFailure]) {
    for failure in failures {
        warn!(
            locale = %failure.locale,
            card_id = %failure.card_id,
            reason = %failure.reason,
            "Could not hash artwork"
        );
    }
}

fn print_verification(report: &VerificationReport, failures: &[BuildFailure]) {
    println!();
    if report.passed() && failures.is_empty() {
        println!("{}", "Reference hashes verified".green().bold());
    } else {
        println!("{}", "Reference hashes out of date".red().bold());
    }
    println!("   {} {}", "Checked:".dimmed(), report.checked);

    for drift in &report.drifts {
        println!(
            "   {} {} ({}) similarity {:.4}",
            "DRIFT".red().bold(),
            drift.card_id,
            drift.locale,
            drift.similarity
        );
    }
    for entry in &report.missing {
        println!(
            "   {} {} ({}) not in stored hashes",
            "MISSING".red().bold(),
            entry.card_id,
            entry.locale
        );
    }
    for failure in failures {
        println!(
            "   {} {} ({}) {}",
            "UNREADABLE".red().bold(),
            failure.card_id,
            failure.locale,
            failure.reason
        );
    }
    for entry in &report.stale {
        println!(
            "   {} {} ({}) has no artwork",
            "STALE".yellow(),
            entry.card_id,
            entry.locale
        );
    }
}
