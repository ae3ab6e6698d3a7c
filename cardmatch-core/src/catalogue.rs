//! Card catalogue and reference artwork lookup.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{CardMatchError, Result};
use crate::hash::ImageSource;

/// Image extensions probed for reference artwork, in priority order.
pub const ARTWORK_EXTENSIONS: [&str; 4] = ["webp", "png", "jpg", "jpeg"];

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogueRow {
    Id(String),
    Card { id: String },
}

/// Ordered list of every known card identifier.
///
/// The order is the iteration order used for tie-breaking during matching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalogue {
    cards: Vec<String>,
}

impl Catalogue {
    /// Build from identifiers, dropping duplicates but keeping first-seen order.
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let cards = ids
            .into_iter()
            .map(Into::into)
            .filter(|id: &String| seen.insert(id.clone()))
            .collect();
        Self { cards }
    }

    /// Parse a JSON array of ids or of objects carrying an `id` field.
    /// Other fields on card objects are ignored.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let rows: Vec<CatalogueRow> = serde_json::from_slice(bytes)?;
        Ok(Self::from_ids(rows.into_iter().map(|row| match row {
            CatalogueRow::Id(id) | CatalogueRow::Card { id } => id,
        })))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            CardMatchError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read catalogue {}: {e}", path.display()),
            ))
        })?;
        Self::from_json(&bytes)
    }

    pub fn ids(&self) -> &[String] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn contains(&self, card_id: &str) -> bool {
        self.cards.iter().any(|id| id == card_id)
    }
}

/// Finds the reference artwork of a card in a given locale.
pub trait ArtworkLocator: Send + Sync {
    /// `None` when the card has no art in that locale.
    fn locate(&self, card_id: &str, locale: &str) -> Option<ImageSource>;
}

/// Artwork laid out as `<root>/<locale>/<card_id>.<ext>`.
#[derive(Debug, Clone)]
pub struct DirectoryArtwork {
    root: PathBuf,
}

impl DirectoryArtwork {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// First existing artwork file for the card, if any.
    pub fn path_for(&self, card_id: &str, locale: &str) -> Option<PathBuf> {
        if !is_safe_component(card_id) || !is_safe_component(locale) {
            return None;
        }
        let dir = self.root.join(locale);
        ARTWORK_EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{card_id}.{ext}")))
            .find(|path| path.is_file())
    }
}

impl ArtworkLocator for DirectoryArtwork {
    fn locate(&self, card_id: &str, locale: &str) -> Option<ImageSource> {
        self.path_for(card_id, locale).map(ImageSource::Path)
    }
}

/// Rejects identifiers that would escape their directory when used as a
/// path component.
pub(crate) fn is_safe_component(value: &str) -> bool {
    !value.is_empty()
        && value != "."
        && value != ".."
        && !value.contains(['/', '\\', '\0'])
}
