//! Runtime configuration.
//!
//! Loaded from `CARDMATCH_*` environment variables with defaults. The hash
//! parameters themselves are compile-time constants in [`crate::hash`].

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;
use crate::pipeline::{DEFAULT_MIN_CONFIDENCE, DEFAULT_TOP_K};
use crate::reference::{DirectorySource, HashSource};

pub const DEFAULT_LOCALE: &str = "en-US";

/// Locales reference hashes are published for.
pub const SHIPPED_LOCALES: [&str; 9] = [
    "en-US", "fr-FR", "de-DE", "it-IT", "es-ES", "pt-BR", "ja-JP", "ko-KR", "zh-TW",
];

#[derive(Debug, Clone, PartialEq)]
pub struct MatcherConfig {
    /// Directory holding `<locale>.json` hash files (default: `hashes`)
    pub hash_dir: PathBuf,
    /// Base URL serving hash files; takes precedence over `hash_dir` when set
    pub hash_url: Option<String>,
    /// Fallback locale for cards without localized art (default: en-US)
    pub default_locale: String,
    /// Locales to generate and load
    pub locales: Vec<String>,
    /// Minimum detection confidence, 0-100 (default: 50)
    pub min_confidence: f32,
    /// Candidates kept per extracted card (default: 5)
    pub top_k: usize,
    /// Directory of durable per-locale hash caches, if any
    pub cache_path: Option<PathBuf>,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            hash_dir: PathBuf::from("hashes"),
            hash_url: None,
            default_locale: DEFAULT_LOCALE.to_string(),
            locales: SHIPPED_LOCALES.iter().map(|l| l.to_string()).collect(),
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            top_k: DEFAULT_TOP_K,
            cache_path: None,
        }
    }
}

impl MatcherConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`. Unparseable values fall back to
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let locales = non_empty("CARDMATCH_LOCALES")
            .map(|list| parse_list(&list))
            .filter(|list| !list.is_empty())
            .unwrap_or(defaults.locales);

        Self {
            hash_dir: non_empty("CARDMATCH_HASH_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.hash_dir),
            hash_url: non_empty("CARDMATCH_HASH_URL"),
            default_locale: non_empty("CARDMATCH_DEFAULT_LOCALE")
                .unwrap_or(defaults.default_locale),
            locales,
            min_confidence: non_empty("CARDMATCH_MIN_CONFIDENCE")
                .and_then(|v| v.parse::<f32>().ok())
                .filter(|v| (0.0..=100.0).contains(v))
                .unwrap_or(defaults.min_confidence),
            top_k: non_empty("CARDMATCH_TOP_K")
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|k| *k > 0)
                .unwrap_or(defaults.top_k),
            cache_path: non_empty("CARDMATCH_CACHE_PATH").map(PathBuf::from),
        }
    }

    /// Build the configured hash source: HTTP when a URL is set, otherwise
    /// the local directory.
    pub fn hash_source(&self) -> Result<Arc<dyn HashSource>> {
        #[cfg(feature = "network")]
        if let Some(url) = &self.hash_url {
            use crate::reference::{HttpSource, HttpSourceConfig};
            return Ok(Arc::new(HttpSource::new(HttpSourceConfig::new(url.clone()))?));
        }
        #[cfg(not(feature = "network"))]
        if self.hash_url.is_some() {
            tracing::warn!("CARDMATCH_HASH_URL ignored: built without the network feature");
        }
        Ok(Arc::new(DirectorySource::new(self.hash_dir.clone())))
    }
}

/// Split a comma-separated list, trimming entries and dropping empty ones.
pub fn parse_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = MatcherConfig::from_lookup(lookup(&[]));
        assert_eq!(config, MatcherConfig::default());
        assert_eq!(config.locales.len(), 9);
        assert_eq!(config.min_confidence, 50.0);
        assert_eq!(config.top_k, 5);
    }

    #[test]
    fn test_overrides() {
        let config = MatcherConfig::from_lookup(lookup(&[
            ("CARDMATCH_HASH_DIR", "/srv/hashes"),
            ("CARDMATCH_DEFAULT_LOCALE", "ja-JP"),
            ("CARDMATCH_LOCALES", " ja-JP, en-US ,,"),
            ("CARDMATCH_MIN_CONFIDENCE", "65.5"),
            ("CARDMATCH_TOP_K", "3"),
            ("CARDMATCH_CACHE_PATH", "/tmp/cardmatch-cache"),
        ]));
        assert_eq!(config.hash_dir, PathBuf::from("/srv/hashes"));
        assert_eq!(config.default_locale, "ja-JP");
        assert_eq!(config.locales, vec!["ja-JP", "en-US"]);
        assert_eq!(config.min_confidence, 65.5);
        assert_eq!(config.top_k, 3);
        assert_eq!(config.cache_path, Some(PathBuf::from("/tmp/cardmatch-cache")));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = MatcherConfig::from_lookup(lookup(&[
            ("CARDMATCH_MIN_CONFIDENCE", "150"),
            ("CARDMATCH_TOP_K", "zero"),
            ("CARDMATCH_LOCALES", " , "),
            ("CARDMATCH_HASH_URL", "  "),
        ]));
        assert_eq!(config.min_confidence, 50.0);
        assert_eq!(config.top_k, 5);
        assert_eq!(config.locales.len(), 9);
        assert!(config.hash_url.is_none());
    }

    #[test]
    fn test_hash_source_defaults_to_directory() {
        let source = MatcherConfig::default().hash_source().unwrap();
        assert_eq!(source.describe(), "directory hashes");
    }
}
