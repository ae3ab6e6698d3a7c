use thiserror::Error;

#[derive(Error, Debug)]
pub enum CardMatchError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),

    #[error("Invalid image source: {0}")]
    InvalidSource(String),

    #[error("Hash format error: {0}")]
    HashFormat(String),

    #[error("Failed to load reference hashes for locale {locale}: {reason}")]
    ReferenceSetLoad { locale: String, reason: String },

    #[error("No reference hash for card {card_id} in locale {locale} or its fallback")]
    ReferenceSetIncomplete { card_id: String, locale: String },

    #[error("Reference hash drift for {card_id} ({locale}): similarity {similarity:.4}")]
    VerificationDrift {
        locale: String,
        card_id: String,
        similarity: f64,
    },

    #[error("Hash cache error: {0}")]
    Cache(String),

    #[error("Invalid detection region: {0}")]
    InvalidRegion(String),

    #[error("Invalid pack definition: {0}")]
    InvalidPack(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Reference hash service at {url} returned status {status}")]
    ServiceStatus { url: String, status: u16 },

    #[cfg(feature = "network")]
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}

impl CardMatchError {
    /// True when a remote hash service could not be reached or refused the request.
    pub fn is_service_unavailable(&self) -> bool {
        match self {
            #[cfg(feature = "network")]
            CardMatchError::Http(_) => true,
            CardMatchError::ServiceStatus { .. } => true,
            _ => false,
        }
    }
}

impl From<image::ImageError> for CardMatchError {
    fn from(err: image::ImageError) -> Self {
        CardMatchError::ImageDecode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CardMatchError>;
