//! Image normalization: decode, bounded resize, lossy re-encode.
//!
//! Every captured image passes through here before it is stored or sent to
//! the extraction service. Two profiles exist: a low-resolution one for
//! symptom photos and a high-resolution one for label scans where downstream
//! OCR accuracy depends on legible text.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::models::ImagePayload;

/// Errors from the normalizer.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("Input is not a decodable raster image: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to re-encode image: {0}")]
    Encode(String),
}

/// Resize/quality bounds for one class of captured image.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ImageProfile {
    /// Longest edge of the output, in pixels.
    #[serde(default = "default_max_edge")]
    pub max_edge: u32,
    /// JPEG quality factor, 1-100.
    #[serde(default = "default_quality")]
    pub quality: u8,
}

fn default_max_edge() -> u32 {
    800
}
fn default_quality() -> u8 {
    60
}

impl Default for ImageProfile {
    fn default() -> Self {
        Self {
            max_edge: default_max_edge(),
            quality: default_quality(),
        }
    }
}

/// Imaging configuration: one profile per capture class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagingConfig {
    /// Thumbnail-grade profile for defect symptom photos.
    #[serde(default)]
    pub photo: ImageProfile,
    /// OCR-grade profile for factory and serial labels.
    #[serde(default = "default_label_profile")]
    pub label: ImageProfile,
}

fn default_label_profile() -> ImageProfile {
    ImageProfile {
        max_edge: 1600,
        quality: 90,
    }
}

impl Default for ImagingConfig {
    fn default() -> Self {
        Self {
            photo: ImageProfile::default(),
            label: default_label_profile(),
        }
    }
}

impl ImagingConfig {
    /// Pick the profile for a slot's capture class.
    pub fn profile_for(&self, slot: crate::models::ImageSlot) -> ImageProfile {
        match slot {
            crate::models::ImageSlot::DefectSymptom => self.photo,
            _ => self.label,
        }
    }
}

/// Normalize raw image bytes into a bounded, JPEG-encoded payload.
///
/// Pure transform: decode, scale so the longer edge does not exceed the
/// profile bound (aspect ratio preserved, never upscaled), re-encode at the
/// profile quality.
pub fn normalize(bytes: &[u8], profile: ImageProfile) -> Result<ImagePayload, NormalizeError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| NormalizeError::UnsupportedFormat(e.to_string()))?;

    let (width, height) = (decoded.width(), decoded.height());
    let longest = width.max(height);

    let resized = if longest > profile.max_edge {
        debug!(
            "Resizing {}x{} image to fit {} px bound",
            width, height, profile.max_edge
        );
        decoded.resize(profile.max_edge, profile.max_edge, FilterType::Triangle)
    } else {
        decoded
    };

    // JPEG has no alpha channel; flatten before encoding.
    let rgb = resized.to_rgb8();
    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, profile.quality);
    encoder
        .encode_image(&rgb)
        .map_err(|e| NormalizeError::Encode(e.to_string()))?;

    Ok(ImagePayload::new("image/jpeg", &out))
}
