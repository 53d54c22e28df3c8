use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::history::ImageMetadata;

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// A reference image and the user's drawing of it, captured at the end of a session.
/// Only `memo` changes after capture.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DrawingPair {
    /// Base64 reference image.
    pub original: String,
    /// Base64 screenshot of the drawing.
    pub screenshot: String,
    /// Local capture time, `YYYYMMDD_HHMMSS`.
    pub timestamp: String,
    #[serde(default, alias = "croquis_time")]
    pub duration_secs: u32,
    #[serde(default, alias = "image_metadata")]
    pub image: ImageMetadata,
    #[serde(default)]
    pub memo: String,
}

impl DrawingPair {
    pub fn new(
        original: &[u8],
        screenshot: &[u8],
        captured_at: NaiveDateTime,
        duration_secs: u32,
        image: ImageMetadata,
    ) -> Self {
        Self {
            original: BASE64.encode(original),
            screenshot: BASE64.encode(screenshot),
            timestamp: captured_at.format(TIMESTAMP_FORMAT).to_string(),
            duration_secs,
            image,
            memo: String::new(),
        }
    }

    pub fn original_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64.decode(&self.original)
    }

    pub fn screenshot_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64.decode(&self.screenshot)
    }

    pub fn captured_at(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.timestamp, TIMESTAMP_FORMAT).ok()
    }

    /// `<timestamp>_<image stem>.croq`, with the stem reduced to filename-safe characters.
    pub fn file_name(&self) -> String {
        let stem = self
            .image
            .filename
            .rsplit_once('.')
            .map_or(self.image.filename.as_str(), |(stem, _)| stem);
        let safe: String = stem
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || matches!(c, '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let safe = if safe.is_empty() { "unknown" } else { &safe };
        format!("{}_{safe}.croq", self.timestamp)
    }
}
