//! RMA record models.
//!
//! An `RmaRecord` is the persisted unit: flat descriptive fields plus exactly
//! three named image slots. Images are carried as normalized payloads whose
//! canonical string form is a data-URL.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Review status of an RMA record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RmaStatus {
    Pending,
    Approved,
    Rejected,
    Processing,
}

impl RmaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Processing => "processing",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "processing" => Some(Self::Processing),
            _ => None,
        }
    }
}

/// MIME types accepted for a stored image payload.
const PERMITTED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/bmp",
];

/// A normalized image: declared MIME type plus base64-encoded bytes.
///
/// Created by the normalizer at capture time; replaces any prior payload in
/// the same slot. The data-URL is the canonical persisted form: payloads
/// serialize as `data:<mime>;base64,<payload>` strings and are parsed back
/// through the same defensive codec on load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime_type: String,
    /// Base64-encoded image bytes.
    pub data: String,
}

impl Serialize for ImagePayload {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.data_url())
    }
}

impl<'de> Deserialize<'de> for ImagePayload {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let url = String::deserialize(deserializer)?;
        Self::from_data_url(&url)
            .ok_or_else(|| serde::de::Error::custom("expected an image data-URL"))
    }
}

impl ImagePayload {
    /// Create a payload from raw encoded image bytes.
    pub fn new(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: BASE64.encode(bytes),
        }
    }

    /// Check whether a MIME type is in the permitted raster set.
    pub fn is_permitted_mime(mime: &str) -> bool {
        PERMITTED_MIME_TYPES.contains(&mime)
    }

    /// Render as a `data:<mime>;base64,<payload>` string.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// Parse a data-URL back into a payload.
    ///
    /// Returns `None` for anything that is not a well-formed data-URL with a
    /// permitted raster MIME type; record loading relies on this never
    /// panicking or erroring.
    pub fn from_data_url(url: &str) -> Option<Self> {
        let rest = url.strip_prefix("data:")?;
        let (mime, data) = rest.split_once(";base64,")?;
        if !Self::is_permitted_mime(mime) {
            return None;
        }
        if data.is_empty() {
            return None;
        }
        Some(Self {
            mime_type: mime.to_string(),
            data: data.to_string(),
        })
    }

    /// Decode the base64 payload into raw bytes.
    pub fn decoded_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64.decode(&self.data)
    }

    /// File extension for the declared MIME type, normalizing `jpeg` to `jpg`.
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "image/bmp" => "bmp",
            _ => "bin",
        }
    }
}

/// The closed set of image slots on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSlot {
    DefectSymptom,
    FactoryBatch,
    OcSerial,
}

impl ImageSlot {
    pub const ALL: [ImageSlot; 3] = [Self::DefectSymptom, Self::FactoryBatch, Self::OcSerial];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DefectSymptom => "defect_symptom",
            Self::FactoryBatch => "factory_batch",
            Self::OcSerial => "oc_serial",
        }
    }

    /// Parse a slot name, accepting the short CLI aliases.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "defect_symptom" | "defect" | "symptom" => Some(Self::DefectSymptom),
            "factory_batch" | "factory" | "batch" => Some(Self::FactoryBatch),
            "oc_serial" | "serial" | "oc" => Some(Self::OcSerial),
            _ => None,
        }
    }
}

/// The three named image slots of a record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defect_symptom: Option<ImagePayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory_batch: Option<ImagePayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oc_serial: Option<ImagePayload>,
}

impl ImageSet {
    pub fn get(&self, slot: ImageSlot) -> Option<&ImagePayload> {
        match slot {
            ImageSlot::DefectSymptom => self.defect_symptom.as_ref(),
            ImageSlot::FactoryBatch => self.factory_batch.as_ref(),
            ImageSlot::OcSerial => self.oc_serial.as_ref(),
        }
    }

    /// Store a payload, replacing any prior payload in the slot.
    pub fn set(&mut self, slot: ImageSlot, payload: ImagePayload) {
        match slot {
            ImageSlot::DefectSymptom => self.defect_symptom = Some(payload),
            ImageSlot::FactoryBatch => self.factory_batch = Some(payload),
            ImageSlot::OcSerial => self.oc_serial = Some(payload),
        }
    }

    pub fn clear(&mut self, slot: ImageSlot) {
        match slot {
            ImageSlot::DefectSymptom => self.defect_symptom = None,
            ImageSlot::FactoryBatch => self.factory_batch = None,
            ImageSlot::OcSerial => self.oc_serial = None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.defect_symptom.is_none() && self.factory_batch.is_none() && self.oc_serial.is_none()
    }
}

/// A persisted RMA case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RmaRecord {
    /// Sequential identifier, assigned at creation. Maps to the "NO" column.
    pub id: String,
    /// System timestamp, immutable after creation.
    pub created_at: DateTime<Utc>,
    pub status: RmaStatus,

    pub customer_country: String,
    pub customer: String,
    /// "From Market or Factory".
    pub source: String,
    pub size: String,
    pub odf: String,
    /// EXPRESSLUCK BOM cross-reference string.
    pub bom: String,
    pub brand: String,
    /// Model P/N (Panel Part No).
    pub model_pn: String,
    pub defect_description: String,
    pub ver: String,
    /// Week/Cycle code.
    pub wc: String,
    pub oc_serial_number: String,
    pub remark: String,
    /// User-facing case date (YYYY-MM-DD).
    pub date: String,

    #[serde(default)]
    pub images: ImageSet,
}

impl RmaRecord {
    /// Case-insensitive search across the dashboard's filterable fields.
    pub fn matches_query(&self, query: &str) -> bool {
        let q = query.to_lowercase();
        self.id.to_lowercase().contains(&q)
            || self.oc_serial_number.to_lowercase().contains(&q)
            || self.customer.to_lowercase().contains(&q)
            || self.model_pn.to_lowercase().contains(&q)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            RmaStatus::Pending,
            RmaStatus::Approved,
            RmaStatus::Rejected,
            RmaStatus::Processing,
        ] {
            assert_eq!(RmaStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RmaStatus::parse("unknown"), None);
    }

    #[test]
    fn test_data_url_roundtrip() {
        let payload = ImagePayload::new("image/jpeg", b"\xff\xd8\xff\xe0fake");
        let url = payload.data_url();
        assert!(url.starts_with("data:image/jpeg;base64,"));
        assert_eq!(ImagePayload::from_data_url(&url), Some(payload));
    }

    #[test]
    fn test_data_url_rejects_malformed() {
        assert_eq!(ImagePayload::from_data_url(""), None);
        assert_eq!(ImagePayload::from_data_url("data:image/png"), None);
        assert_eq!(ImagePayload::from_data_url("data:image/;base64,AAAA"), None);
        assert_eq!(
            ImagePayload::from_data_url("data:text/plain;base64,aGVsbG8="),
            None
        );
        assert_eq!(ImagePayload::from_data_url("data:image/png;base64,"), None);
        assert_eq!(ImagePayload::from_data_url("http://example.com/a.png"), None);
    }

    #[test]
    fn test_payload_persists_as_data_url() {
        let payload = ImagePayload::new("image/png", b"pixels");
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(json, format!("\"{}\"", payload.data_url()));

        let back: ImagePayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_payload_load_rejects_non_image_data_url() {
        assert!(serde_json::from_str::<ImagePayload>("\"data:text/plain;base64,aGk=\"").is_err());
        assert!(serde_json::from_str::<ImagePayload>("\"http://example.com/a.png\"").is_err());
    }

    #[test]
    fn test_extension_normalizes_jpeg() {
        let payload = ImagePayload::new("image/jpeg", b"x");
        assert_eq!(payload.extension(), "jpg");
        let payload = ImagePayload::new("image/png", b"x");
        assert_eq!(payload.extension(), "png");
    }

    #[test]
    fn test_slot_parse_aliases() {
        assert_eq!(ImageSlot::parse("defect"), Some(ImageSlot::DefectSymptom));
        assert_eq!(ImageSlot::parse("factory-batch"), Some(ImageSlot::FactoryBatch));
        assert_eq!(ImageSlot::parse("serial"), Some(ImageSlot::OcSerial));
        assert_eq!(ImageSlot::parse("thumbnail"), None);
    }

    #[test]
    fn test_image_set_overwrite() {
        let mut images = ImageSet::default();
        assert!(images.is_empty());

        images.set(ImageSlot::OcSerial, ImagePayload::new("image/jpeg", b"v1"));
        images.set(ImageSlot::OcSerial, ImagePayload::new("image/jpeg", b"v2"));
        let stored = images.get(ImageSlot::OcSerial).unwrap();
        assert_eq!(stored.decoded_bytes().unwrap(), b"v2");

        images.clear(ImageSlot::OcSerial);
        assert!(images.is_empty());
    }
}
