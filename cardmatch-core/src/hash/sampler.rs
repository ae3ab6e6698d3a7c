//! Image sources and pixel sampler backends.
//!
//! Both backends produce the same [`PixelGrid`] shape and feed the same
//! encoder, so fingerprints from either are comparable. They differ only in
//! how they get to pixels: [`ImageSampler`] decodes encoded images itself,
//! while [`RawBufferSampler`] takes pixel buffers produced by an external
//! decoder during batch runs.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};
use tracing::debug;

use super::fingerprint::GRID_SIZE;
use crate::error::{CardMatchError, Result};

/// Channel layout of a raw pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    Rgb,
    Rgba,
}

impl PixelLayout {
    pub fn channels(self) -> usize {
        match self {
            PixelLayout::Rgb => 3,
            PixelLayout::Rgba => 4,
        }
    }
}

/// Undecoded-format pixel buffer handed over by a host decoder.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    pub pixels: Vec<u8>,
}

impl RawImage {
    /// Convert to an RGB image, dropping alpha.
    pub fn to_rgb_image(&self) -> Result<RgbImage> {
        let expected = self.width as usize * self.height as usize * self.layout.channels();
        if self.pixels.len() != expected {
            return Err(CardMatchError::InvalidSource(format!(
                "raw buffer holds {} bytes, expected {} for {}x{} {:?}",
                self.pixels.len(),
                expected,
                self.width,
                self.height,
                self.layout
            )));
        }

        let rgb = match self.layout {
            PixelLayout::Rgb => self.pixels.clone(),
            PixelLayout::Rgba => self
                .pixels
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect(),
        };

        RgbImage::from_raw(self.width, self.height, rgb)
            .ok_or_else(|| CardMatchError::InvalidSource("raw buffer size mismatch".into()))
    }
}

/// Anything that can be turned into pixels.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Encoded image file contents (PNG, JPEG, WebP, GIF).
    Encoded(Vec<u8>),
    /// `data:<mime>;base64,<payload>` URL.
    DataUrl(String),
    /// Image file on disk.
    Path(PathBuf),
    /// Image already decoded by the caller.
    Decoded(DynamicImage),
    /// Raw pixels from an external decoder.
    Raw(RawImage),
}

impl ImageSource {
    pub fn path(path: impl AsRef<Path>) -> Self {
        ImageSource::Path(path.as_ref().to_path_buf())
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ImageSource::Encoded(_) => "encoded",
            ImageSource::DataUrl(_) => "data-url",
            ImageSource::Path(_) => "path",
            ImageSource::Decoded(_) => "decoded",
            ImageSource::Raw(_) => "raw",
        }
    }
}

impl From<DynamicImage> for ImageSource {
    fn from(image: DynamicImage) -> Self {
        ImageSource::Decoded(image)
    }
}

/// `GRID_SIZE × GRID_SIZE` RGB samples stored as three parallel planes,
/// indexed `row * size + col`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelGrid {
    size: usize,
    red: Vec<u8>,
    green: Vec<u8>,
    blue: Vec<u8>,
}

impl PixelGrid {
    pub fn new(size: usize, red: Vec<u8>, green: Vec<u8>, blue: Vec<u8>) -> Result<Self> {
        let expected = size * size;
        if red.len() != expected || green.len() != expected || blue.len() != expected {
            return Err(CardMatchError::InvalidSource(format!(
                "pixel planes must each hold {expected} samples"
            )));
        }
        Ok(Self {
            size,
            red,
            green,
            blue,
        })
    }

    /// Split a square RGB image into planes.
    pub fn from_rgb_image(image: &RgbImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        if width != height {
            return Err(CardMatchError::InvalidSource(format!(
                "pixel grid must be square, got {width}x{height}"
            )));
        }
        let count = (width * height) as usize;
        let mut red = Vec::with_capacity(count);
        let mut green = Vec::with_capacity(count);
        let mut blue = Vec::with_capacity(count);
        for px in image.pixels() {
            red.push(px.0[0]);
            green.push(px.0[1]);
            blue.push(px.0[2]);
        }
        Self::new(width as usize, red, green, blue)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Planes in R, G, B order.
    pub fn channels(&self) -> [&[u8]; 3] {
        [&self.red, &self.green, &self.blue]
    }
}

/// Backend turning an image source into a pixel grid.
pub trait PixelSampler: Send + Sync {
    fn sample(&self, source: &ImageSource) -> Result<PixelGrid>;

    /// Sample an image the caller keeps ownership of.
    fn sample_image(&self, image: &DynamicImage) -> Result<PixelGrid> {
        self.sample(&ImageSource::Decoded(image.clone()))
    }
}

/// Decodes any supported source with the `image` crate and downsamples with
/// bicubic (Catmull-Rom) filtering.
#[derive(Debug, Clone)]
pub struct ImageSampler {
    filter: FilterType,
}

impl ImageSampler {
    pub fn new() -> Self {
        Self {
            filter: FilterType::CatmullRom,
        }
    }

    pub fn with_filter(filter: FilterType) -> Self {
        Self { filter }
    }
}

impl Default for ImageSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl PixelSampler for ImageSampler {
    fn sample(&self, source: &ImageSource) -> Result<PixelGrid> {
        match source {
            ImageSource::Decoded(image) => self.sample_image(image),
            other => {
                let image = load_image(other)?;
                debug!(
                    kind = other.kind(),
                    width = image.width(),
                    height = image.height(),
                    "Decoded image"
                );
                self.sample_image(&image)
            }
        }
    }

    fn sample_image(&self, image: &DynamicImage) -> Result<PixelGrid> {
        downsample(&image.to_rgb8(), self.filter)
    }
}

/// Samples raw pixel buffers and already-decoded images; intended for
/// offline tooling that decodes with its own codec stack. Defaults to
/// Lanczos3 resampling.
#[derive(Debug, Clone)]
pub struct RawBufferSampler {
    filter: FilterType,
}

impl RawBufferSampler {
    pub fn new() -> Self {
        Self {
            filter: FilterType::Lanczos3,
        }
    }

    pub fn with_filter(filter: FilterType) -> Self {
        Self { filter }
    }
}

impl Default for RawBufferSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl PixelSampler for RawBufferSampler {
    fn sample(&self, source: &ImageSource) -> Result<PixelGrid> {
        match source {
            ImageSource::Raw(raw) => downsample(&raw.to_rgb_image()?, self.filter),
            ImageSource::Decoded(image) => self.sample_image(image),
            other => Err(CardMatchError::InvalidSource(format!(
                "raw buffer sampler cannot read {} sources",
                other.kind()
            ))),
        }
    }

    fn sample_image(&self, image: &DynamicImage) -> Result<PixelGrid> {
        downsample(&image.to_rgb8(), self.filter)
    }
}

/// Decode any image source into a `DynamicImage`.
pub fn load_image(source: &ImageSource) -> Result<DynamicImage> {
    match source {
        ImageSource::Encoded(bytes) => decode_bytes(bytes),
        ImageSource::DataUrl(url) => decode_bytes(&parse_data_url(url)?),
        ImageSource::Path(path) => image::open(path)
            .map_err(|e| CardMatchError::ImageDecode(format!("{}: {e}", path.display()))),
        ImageSource::Decoded(image) => Ok(image.clone()),
        ImageSource::Raw(raw) => Ok(DynamicImage::ImageRgb8(raw.to_rgb_image()?)),
    }
}

fn decode_bytes(bytes: &[u8]) -> Result<DynamicImage> {
    if bytes.is_empty() {
        return Err(CardMatchError::ImageDecode("empty image buffer".into()));
    }
    Ok(image::load_from_memory(bytes)?)
}

/// Extract the payload of a base64 `data:` URL.
pub(crate) fn parse_data_url(url: &str) -> Result<Vec<u8>> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| CardMatchError::InvalidSource("not a data: URL".into()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| CardMatchError::InvalidSource("data: URL has no payload".into()))?;
    if !header.ends_with(";base64") {
        return Err(CardMatchError::InvalidSource(
            "only base64 data: URLs are supported".into(),
        ));
    }
    BASE64
        .decode(payload.trim())
        .map_err(|e| CardMatchError::InvalidSource(format!("invalid data: URL payload: {e}")))
}

fn downsample(image: &RgbImage, filter: FilterType) -> Result<PixelGrid> {
    if image.width() == 0 || image.height() == 0 {
        return Err(CardMatchError::ImageDecode("image has no pixels".into()));
    }
    let side = GRID_SIZE as u32;
    let resized = imageops::resize(image, side, side, filter);
    PixelGrid::from_rgb_image(&resized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, Rgba, RgbaImage};
    use std::io::Cursor;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 128])
        })
    }

    fn png_bytes(image: &RgbImage) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_sample_produces_fixed_grid() {
        let grid = ImageSampler::new()
            .sample(&ImageSource::Encoded(png_bytes(&gradient(200, 280))))
            .unwrap();
        assert_eq!(grid.size(), GRID_SIZE);
        for plane in grid.channels() {
            assert_eq!(plane.len(), GRID_SIZE * GRID_SIZE);
        }
    }

    #[test]
    fn test_data_url_matches_encoded_bytes() {
        let bytes = png_bytes(&gradient(64, 64));
        let url = format!("data:image/png;base64,{}", BASE64.encode(&bytes));
        let sampler = ImageSampler::new();
        let from_url = sampler.sample(&ImageSource::DataUrl(url)).unwrap();
        let from_bytes = sampler.sample(&ImageSource::Encoded(bytes)).unwrap();
        assert_eq!(from_url, from_bytes);
    }

    #[test]
    fn test_invalid_sources_are_rejected() {
        let sampler = ImageSampler::new();
        assert!(matches!(
            sampler.sample(&ImageSource::Encoded(b"definitely not an image".to_vec())),
            Err(CardMatchError::ImageDecode(_))
        ));
        assert!(matches!(
            sampler.sample(&ImageSource::Encoded(Vec::new())),
            Err(CardMatchError::ImageDecode(_))
        ));
        assert!(matches!(
            sampler.sample(&ImageSource::DataUrl("https://example.com/a.png".into())),
            Err(CardMatchError::InvalidSource(_))
        ));
        assert!(matches!(
            sampler.sample(&ImageSource::DataUrl("data:image/png,rawtext".into())),
            Err(CardMatchError::InvalidSource(_))
        ));
        assert!(sampler
            .sample(&ImageSource::path("/nonexistent/card.png"))
            .is_err());
    }

    #[test]
    fn test_alpha_is_discarded() {
        let rgba = RgbaImage::from_fn(32, 32, |x, _| Rgba([x as u8 * 8, 10, 20, (x * 4) as u8]));
        let opaque = RgbImage::from_fn(32, 32, |x, _| Rgb([x as u8 * 8, 10, 20]));
        let sampler = ImageSampler::new();
        let a = sampler
            .sample(&ImageSource::Decoded(DynamicImage::ImageRgba8(rgba)))
            .unwrap();
        let b = sampler
            .sample(&ImageSource::Decoded(DynamicImage::ImageRgb8(opaque)))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_raw_buffer_sampler() {
        let image = gradient(96, 96);
        let rgba: Vec<u8> = image
            .pixels()
            .flat_map(|p| [p.0[0], p.0[1], p.0[2], 255])
            .collect();
        let raw = ImageSource::Raw(RawImage {
            width: 96,
            height: 96,
            layout: PixelLayout::Rgba,
            pixels: rgba,
        });
        let grid = RawBufferSampler::new().sample(&raw).unwrap();
        assert_eq!(grid.size(), GRID_SIZE);

        // Decoded images go through the same resampling as raw buffers.
        let decoded = DynamicImage::ImageRgb8(image.clone());
        assert_eq!(RawBufferSampler::new().sample_image(&decoded).unwrap(), grid);
        assert_eq!(
            RawBufferSampler::new()
                .sample(&ImageSource::Decoded(decoded))
                .unwrap(),
            grid
        );

        let rejected = RawBufferSampler::new().sample(&ImageSource::Encoded(png_bytes(&image)));
        assert!(matches!(rejected, Err(CardMatchError::InvalidSource(_))));
    }

    #[test]
    fn test_raw_buffer_length_is_checked() {
        let raw = RawImage {
            width: 10,
            height: 10,
            layout: PixelLayout::Rgb,
            pixels: vec![0; 299],
        };
        assert!(raw.to_rgb_image().is_err());
    }

    #[test]
    fn test_grid_rejects_wrong_plane_length() {
        assert!(PixelGrid::new(2, vec![0; 4], vec![0; 4], vec![0; 3]).is_err());
    }
}
