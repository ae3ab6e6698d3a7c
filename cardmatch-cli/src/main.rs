//! CardMatch CLI - reference hash generation and card identification.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  64  Usage error (invalid arguments)
  65  Data error (hash drift, undecodable image, invalid pack)
  66  Input file or reference hashes not found
  69  Reference hash service unavailable
  74  Failed to write output";

#[derive(Parser)]
#[command(name = "cardmatch")]
#[command(author, version, about = "Perceptual-hash trading card identification", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Only print errors and machine-readable output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hash every card's artwork into per-locale reference files
    Generate {
        /// Catalogue JSON listing every card id
        #[arg(long, value_name = "FILE")]
        catalogue: PathBuf,

        /// Artwork root laid out as <DIR>/<locale>/<card_id>.<ext>
        #[arg(long, value_name = "DIR")]
        images: PathBuf,

        /// Output directory for <locale>.json hash files
        #[arg(long, value_name = "DIR", env = "CARDMATCH_HASH_DIR", default_value = "hashes")]
        out: PathBuf,

        /// Comma-separated locales (defaults to CARDMATCH_LOCALES or all shipped locales)
        #[arg(long, value_name = "LIST")]
        locales: Option<String>,

        /// Recompute and compare against the files in --out instead of writing
        #[arg(long)]
        verify: bool,

        /// Minimum similarity a stored hash must keep under --verify
        #[arg(long, default_value_t = cardmatch_core::VERIFY_SIMILARITY_THRESHOLD)]
        threshold: f64,

        /// Reuse hashes from per-locale cache files in this directory
        /// [default: $CARDMATCH_CACHE_PATH]
        #[arg(long, value_name = "DIR")]
        cache: Option<PathBuf>,
    },

    /// Print the fingerprint of an image
    Hash {
        /// Image file to hash
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Print a JSON object instead of bare base64
        #[arg(long)]
        json: bool,
    },

    /// Compare two images and print their similarity
    Compare {
        #[arg(value_name = "A")]
        first: PathBuf,

        #[arg(value_name = "B")]
        second: PathBuf,
    },

    /// Identify the cards in a photo against reference hashes
    Match {
        /// Photo or card scan
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Directory of reference hash files (defaults to CARDMATCH_HASH_URL or CARDMATCH_HASH_DIR)
        #[arg(long, value_name = "DIR")]
        hashes: Option<PathBuf>,

        /// Active locale
        #[arg(long, value_name = "LOCALE")]
        locale: Option<String>,

        /// Fallback locale for cards without localized art
        #[arg(long, value_name = "LOCALE")]
        default_locale: Option<String>,

        /// JSON array of detection regions; the whole image is one card when omitted
        #[arg(long, value_name = "FILE")]
        detections: Option<PathBuf>,

        /// Candidates to show per card
        #[arg(long, value_name = "K")]
        top_k: Option<usize>,

        /// Minimum detection confidence (0-100)
        #[arg(long, value_name = "C")]
        min_confidence: Option<f32>,

        /// Similarity a best match needs to be reported as identified
        #[arg(long, value_name = "S")]
        min_similarity: Option<f64>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Chance that one pack contains at least one card you do not own
    PullRate {
        /// Pack definition JSON
        #[arg(long, value_name = "FILE")]
        pack: PathBuf,

        /// JSON array of owned card ids
        #[arg(long, value_name = "FILE")]
        owned: Option<PathBuf>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default = match (quiet, verbose) {
        (true, _) => "cardmatch=warn",
        (false, 0) => "cardmatch=info",
        (false, 1) => "cardmatch=debug",
        (false, _) => "cardmatch=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            let code = if err.use_stderr() {
                exit_codes::USAGE_ERROR
            } else {
                exit_codes::SUCCESS
            };
            return ExitCode {
                code,
                message: None,
            }
            .report();
        }
    };

    init_tracing(cli.verbose, cli.quiet);
    let quiet = cli.quiet;

    let result = match cli.command {
        Commands::Generate {
            catalogue,
            images,
            out,
            locales,
            verify,
            threshold,
            cache,
        } => commands::generate::execute(
            commands::generate::GenerateArgs {
                catalogue,
                images,
                out,
                locales,
                verify,
                threshold,
                cache,
            },
            quiet,
        ),
        Commands::Hash { file, json } => commands::hash::execute(file, json),
        Commands::Compare { first, second } => commands::compare::execute(first, second, quiet),
        Commands::Match {
            file,
            hashes,
            locale,
            default_locale,
            detections,
            top_k,
            min_confidence,
            min_similarity,
            json,
        } => {
            commands::matching::execute(commands::matching::MatchArgs {
                file,
                hashes,
                locale,
                default_locale,
                detections,
                top_k,
                min_confidence,
                min_similarity,
                json,
            })
            .await
        }
        Commands::PullRate { pack, owned, json } => {
            commands::pull_rate::execute(pack, owned, json)
        }
    };

    match result {
        Ok(()) => ExitCode::success(),
        Err(err) => ExitCode::from_anyhow(&err),
    }
    .report()
}
