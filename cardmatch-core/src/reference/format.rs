//! Reference hash file format.
//!
//! One file per locale, named `<locale>.json`, holding a JSON object that maps
//! card id to the base64 encoding of the fingerprint's little-endian words:
//!
//! ```json
//! { "A1-001": "q83vAAAAAAD...", "A1-002": "..." }
//! ```

use std::path::Path;

use tracing::debug;

use super::set::LocaleHashes;
use crate::catalogue::is_safe_component;
use crate::error::{CardMatchError, Result};

pub fn hash_file_name(locale: &str) -> Result<String> {
    if !is_safe_component(locale) {
        return Err(CardMatchError::InvalidSource(format!(
            "invalid locale name: {locale:?}"
        )));
    }
    Ok(format!("{locale}.json"))
}

/// Parse one locale's hash file. Any malformed entry fails the whole file.
pub fn parse_hash_file(locale: &str, bytes: &[u8]) -> Result<LocaleHashes> {
    serde_json::from_slice(bytes).map_err(|e| CardMatchError::ReferenceSetLoad {
        locale: locale.to_string(),
        reason: format!("corrupt hash file: {e}"),
    })
}

/// Render hashes as pretty JSON with keys in card-id order.
pub fn render_hash_file(hashes: &LocaleHashes) -> Result<String> {
    Ok(serde_json::to_string_pretty(hashes)?)
}

/// Read `<dir>/<locale>.json`. A missing file yields `Ok(None)`.
pub fn read_hash_file(dir: &Path, locale: &str) -> Result<Option<LocaleHashes>> {
    let path = dir.join(hash_file_name(locale)?);
    match std::fs::read(&path) {
        Ok(bytes) => {
            let hashes = parse_hash_file(locale, &bytes)?;
            debug!(path = %path.display(), entries = hashes.len(), "Read hash file");
            Ok(Some(hashes))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CardMatchError::ReferenceSetLoad {
            locale: locale.to_string(),
            reason: format!("{}: {e}", path.display()),
        }),
    }
}

/// Write `<dir>/<locale>.json` via a temporary file and rename.
pub fn write_hash_file(dir: &Path, locale: &str, hashes: &LocaleHashes) -> Result<std::path::PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(hash_file_name(locale)?);
    let tmp = dir.join(format!(".{}.tmp", hash_file_name(locale)?));
    std::fs::write(&tmp, render_hash_file(hashes)?)?;
    std::fs::rename(&tmp, &path)?;
    debug!(path = %path.display(), entries = hashes.len(), "Wrote hash file");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Fingerprint;

    #[test]
    fn test_file_roundtrip_preserves_bits() {
        let dir = tempfile::tempdir().unwrap();
        let mut hashes = LocaleHashes::new();
        hashes.insert(
            "A1-001".into(),
            Fingerprint::from_words((0..14).map(|i| 0x9E37_79B9u32.rotate_left(i)).collect()),
        );
        hashes.insert("A1-002".into(), Fingerprint::from_words(vec![0; 14]));

        write_hash_file(dir.path(), "en-US", &hashes).unwrap();
        let back = read_hash_file(dir.path(), "en-US").unwrap().unwrap();
        assert_eq!(back, hashes);
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_hash_file(dir.path(), "fr-FR").unwrap().is_none());
    }

    #[test]
    fn test_corrupt_file_is_load_error() {
        let err = parse_hash_file("en-US", br#"{"A1-001": "!!!"}"#).unwrap_err();
        assert!(matches!(err, CardMatchError::ReferenceSetLoad { .. }));
        assert!(parse_hash_file("en-US", b"[1,2,3]").is_err());
    }

    #[test]
    fn test_rendered_keys_are_sorted() {
        let mut hashes = LocaleHashes::new();
        hashes.insert("B".into(), Fingerprint::from_words(vec![1]));
        hashes.insert("A".into(), Fingerprint::from_words(vec![2]));
        let json = render_hash_file(&hashes).unwrap();
        assert!(json.find("\"A\"").unwrap() < json.find("\"B\"").unwrap());
    }

    #[test]
    fn test_locale_name_is_validated() {
        assert!(hash_file_name("../../etc").is_err());
        assert_eq!(hash_file_name("en-US").unwrap(), "en-US.json");
    }
}
