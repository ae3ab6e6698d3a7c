//! Exit codes following sysexits.h conventions.
//!
//! CI jobs running `cardmatch generate --verify` rely on these to tell stale
//! reference data apart from a broken environment.

use cardmatch_core::CardMatchError;
use colored::Colorize;

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage error (invalid arguments).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// Data format error: reference hash drift, undecodable image, bad pack file.
/// Maps to EX_DATAERR from sysexits.h.
pub const DATA_ERROR: i32 = 65;

/// Cannot open input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Reference hash service unavailable.
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const NETWORK_ERROR: i32 = 69;

/// I/O error (cannot write output file).
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// Represents an exit code with optional error context.
#[derive(Debug)]
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        Self {
            code: classify(err),
            message: Some(format!("{err:#}")),
        }
    }

    /// Print the error, if any, and convert for `main`.
    pub fn report(self) -> std::process::ExitCode {
        if let Some(message) = &self.message {
            eprintln!("{} {}", "Error:".red().bold(), message);
        }
        std::process::ExitCode::from(u8::try_from(self.code).unwrap_or(1))
    }
}

/// Context prefixes the commands attach, with the code each one means.
const CONTEXT_CODES: &[(&str, i32)] = &[
    ("Failed to read", INPUT_ERROR),
    ("Failed to load reference hashes", INPUT_ERROR),
    ("Failed to decode image", DATA_ERROR),
    ("Failed to parse", DATA_ERROR),
    ("Verification failed", DATA_ERROR),
    ("Failed to write", IO_ERROR),
];

/// Classify by the typed causes in the chain and the outermost context.
///
/// Only context prefixes are compared, so paths or URLs embedded in a
/// message never change the code.
fn classify(err: &anyhow::Error) -> i32 {
    let mut causes = err
        .chain()
        .filter_map(|cause| cause.downcast_ref::<CardMatchError>());
    if causes.clone().any(CardMatchError::is_service_unavailable) {
        return NETWORK_ERROR;
    }

    let outer = err.to_string();
    if let Some((_, code)) = CONTEXT_CODES
        .iter()
        .find(|(prefix, _)| outer.starts_with(prefix))
    {
        return *code;
    }

    match causes.next() {
        Some(
            CardMatchError::ImageDecode(_)
            | CardMatchError::InvalidPack(_)
            | CardMatchError::HashFormat(_)
            | CardMatchError::VerificationDrift { .. },
        ) => DATA_ERROR,
        Some(CardMatchError::ReferenceSetLoad { .. }) => INPUT_ERROR,
        _ => GENERAL_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Context};

    #[test]
    fn test_classification() {
        let missing: anyhow::Result<()> = Err(anyhow!("No such file or directory"));
        let err = missing
            .context("Failed to read file: card.png")
            .unwrap_err();
        assert_eq!(ExitCode::from_anyhow(&err).code, INPUT_ERROR);

        assert_eq!(classify(&anyhow!("Verification failed: 1 drifted")), DATA_ERROR);
        assert_eq!(
            classify(&anyhow!("bad header").context("Failed to decode image: card.png")),
            DATA_ERROR
        );
        assert_eq!(
            classify(&anyhow!("denied").context("Failed to write hash files to out")),
            IO_ERROR
        );
        assert_eq!(classify(&anyhow!("something else")), GENERAL_ERROR);
    }

    #[test]
    fn test_typed_causes_without_context() {
        let pack = anyhow::Error::new(CardMatchError::InvalidPack("no slots".into()));
        assert_eq!(classify(&pack), DATA_ERROR);

        let unavailable = anyhow::Error::new(CardMatchError::ServiceStatus {
            url: "https://cdn.example.com/hashes/en-US.json".into(),
            status: 503,
        })
        .context("Failed to load reference hashes from https://cdn.example.com/hashes");
        assert_eq!(classify(&unavailable), NETWORK_ERROR);

        let local = anyhow::Error::new(CardMatchError::ReferenceSetLoad {
            locale: "en-US".into(),
            reason: "no hash file in ./hashes".into(),
        })
        .context("Failed to load reference hashes from ./hashes");
        assert_eq!(classify(&local), INPUT_ERROR);
    }

    #[test]
    fn test_words_inside_paths_do_not_change_code() {
        let err = anyhow::Error::new(std::io::Error::from(std::io::ErrorKind::NotFound))
            .context("Failed to read file: /srv/network/decode/HTTP/card.png");
        assert_eq!(classify(&err), INPUT_ERROR);

        let err = anyhow!("no such directory")
            .context("Failed to read hash files in /srv/network/hashes");
        assert_eq!(classify(&err), INPUT_ERROR);

        let err = anyhow::Error::new(CardMatchError::ReferenceSetLoad {
            locale: "en-US".into(),
            reason: "no hash file in /srv/network/invalid pack".into(),
        })
        .context("Failed to load reference hashes from /srv/network/invalid pack");
        assert_eq!(classify(&err), INPUT_ERROR);

        let err = anyhow!("disk full").context("Failed to write hash files to /tmp/decode");
        assert_eq!(classify(&err), IO_ERROR);

        assert_eq!(classify(&anyhow!("No locales given for /network")), GENERAL_ERROR);
    }

    #[test]
    fn test_success_has_no_message() {
        let code = ExitCode::success();
        assert_eq!(code.code, SUCCESS);
        assert!(code.message.is_none());
        assert_eq!(USAGE_ERROR, 64);
    }
}
