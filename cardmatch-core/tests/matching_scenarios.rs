//! End-to-end matching scenarios: detection filtering, locale fallback,
//! verification of corrupted reference data and empty reference sets.

use std::sync::Arc;

use cardmatch_core::generator::{load_hash_files, write_hash_files};
use cardmatch_core::hash::{CardHasher, ImageSource};
use cardmatch_core::reference::{read_hash_file, write_hash_file};
use cardmatch_core::{
    build, resolve, verify, ArtworkLocator, Catalogue, DetectionRegion, DirectorySource,
    Fingerprint, LocaleHashes, Pipeline, ReferenceSet, ReferenceStore,
    VERIFY_SIMILARITY_THRESHOLD,
};
use image::{DynamicImage, Rgb, RgbImage};

/// Checkerboards with a per-card cell size; `fr-FR` only has art for A1-002.
struct CheckerArtwork;

fn checker(cell: u32) -> RgbImage {
    RgbImage::from_fn(150, 210, |x, y| {
        if ((x / cell) + (y / cell)) % 2 == 0 {
            Rgb([250, 220, 60])
        } else {
            Rgb([40, 20, 110])
        }
    })
}

fn cell_for(card_id: &str, locale: &str) -> Option<u32> {
    match (card_id, locale) {
        ("A1-001", "en-US") => Some(50),
        ("A1-002", "en-US") => Some(21),
        ("A1-002", "fr-FR") => Some(19),
        ("A1-003", "en-US") => Some(8),
        _ => None,
    }
}

impl ArtworkLocator for CheckerArtwork {
    fn locate(&self, card_id: &str, locale: &str) -> Option<ImageSource> {
        cell_for(card_id, locale)
            .map(|cell| ImageSource::Decoded(DynamicImage::ImageRgb8(checker(cell))))
    }
}

fn catalogue() -> Catalogue {
    Catalogue::from_ids(["A1-001", "A1-002", "A1-003"])
}

fn locales() -> Vec<String> {
    vec!["en-US".to_string(), "fr-FR".to_string()]
}

fn photo_with(card: &RgbImage, at: (i64, i64)) -> DynamicImage {
    let mut photo = RgbImage::from_pixel(640, 480, Rgb([90, 90, 90]));
    image::imageops::replace(&mut photo, card, at.0, at.1);
    DynamicImage::ImageRgb8(photo)
}

#[test]
fn test_low_confidence_detection_is_filtered() {
    let hasher = CardHasher::default();
    let report = build(&catalogue(), &locales(), &CheckerArtwork, &hasher);
    let reference = ReferenceSet::new("en-US")
        .with_catalogue(&catalogue())
        .with_locale("en-US", report.hashes["en-US"].clone());

    let mut photo = RgbImage::from_pixel(640, 480, Rgb([90, 90, 90]));
    image::imageops::replace(&mut photo, &checker(50), 20, 20);
    image::imageops::replace(&mut photo, &checker(8), 300, 20);

    let detections = vec![
        DetectionRegion::from_rect(20.0, 20.0, 150.0, 210.0, 40.0),
        DetectionRegion::from_rect(300.0, 20.0, 150.0, 210.0, 80.0),
    ];
    let cards = Pipeline::new(hasher).process(
        &DynamicImage::ImageRgb8(photo),
        &detections,
        &reference,
        "en-US",
    );

    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].region.confidence, 80.0);
    assert_eq!(cards[0].matches.best().unwrap().card_id, "A1-003");
    assert!(cards[0].matches.len() <= 5);
}

#[tokio::test]
async fn test_missing_localized_hash_falls_back_to_default_locale() {
    let dir = tempfile::tempdir().unwrap();
    let hasher = CardHasher::default();
    let report = build(&catalogue(), &locales(), &CheckerArtwork, &hasher);
    write_hash_files(dir.path(), &report.hashes).unwrap();

    let fr = read_hash_file(dir.path(), "fr-FR").unwrap().unwrap();
    assert!(!fr.contains_key("A1-001"));

    let store = ReferenceStore::new(Arc::new(DirectorySource::new(dir.path())), "en-US");
    let reference = store.reference_set("fr-FR").await.unwrap();

    let query = hasher
        .hash_image(&photo_with(&checker(50), (100, 100)).crop_imm(100, 100, 150, 210))
        .unwrap();
    let result = resolve(&query, &reference, "fr-FR");
    assert!(result.top_k(5).iter().any(|m| m.card_id == "A1-001"));
    assert_eq!(result.best().unwrap().card_id, "A1-001");
    assert_eq!(result.len(), 3);
}

#[test]
fn test_localized_art_is_preferred_over_default() {
    let hasher = CardHasher::default();
    let report = build(&catalogue(), &locales(), &CheckerArtwork, &hasher);
    let reference = ReferenceSet::new("en-US")
        .with_locale("en-US", report.hashes["en-US"].clone())
        .with_locale("fr-FR", report.hashes["fr-FR"].clone());

    let french = reference.fingerprint("A1-002", "fr-FR").unwrap();
    let english = reference.fingerprint("A1-002", "en-US").unwrap();
    assert_eq!(french, &report.hashes["fr-FR"]["A1-002"]);
    assert_ne!(french, english);
}

#[test]
fn test_verify_reports_only_the_corrupted_card() {
    let dir = tempfile::tempdir().unwrap();
    let hasher = CardHasher::default();
    let report = build(&catalogue(), &locales(), &CheckerArtwork, &hasher);
    write_hash_files(dir.path(), &report.hashes).unwrap();

    // Flip every third bit of one stored entry.
    let mut en: LocaleHashes = read_hash_file(dir.path(), "en-US").unwrap().unwrap();
    let original = en["A1-002"].clone();
    let corrupted = Fingerprint::from_bits(
        (0..cardmatch_core::FINGERPRINT_BITS)
            .map(|i| original.bit(i).unwrap_or(false) ^ (i % 3 == 0)),
    );
    en.insert("A1-002".into(), corrupted);
    write_hash_file(dir.path(), "en-US", &en).unwrap();

    let stored = load_hash_files(dir.path(), &locales()).unwrap();
    let recomputed = build(&catalogue(), &locales(), &CheckerArtwork, &hasher);
    let verification = verify(&stored, &recomputed.hashes, VERIFY_SIMILARITY_THRESHOLD);

    assert!(!verification.passed());
    assert_eq!(verification.drifts.len(), 1);
    assert_eq!(verification.drifts[0].card_id, "A1-002");
    assert_eq!(verification.drifts[0].locale, "en-US");
    assert_eq!(verification.checked, 4);
    assert!(verification.missing.is_empty());
}

#[test]
fn test_empty_reference_set_yields_empty_result() {
    let query = CardHasher::default()
        .hash_image(&DynamicImage::ImageRgb8(checker(30)))
        .unwrap();
    let result = resolve(&query, &ReferenceSet::new("en-US"), "en-US");
    assert!(result.is_empty());
    assert!(result.best().is_none());
}
