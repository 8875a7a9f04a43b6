//! AI-assisted structured extraction from captured images.

mod client;
mod gemini;
mod parse;
pub mod simulate;

use thiserror::Error;

pub use client::{
    ExtractionClient, ExtractionConfig, FallbackPolicy, DEFAULT_DESCRIPTION, MIN_CREDENTIAL_LEN,
};
pub use parse::{
    match_defect_category, parse_factory_details, parse_oc_details, strip_code_fence,
    FactoryDetails, OcDetails, DEFAULT_DEFECT_CATEGORY, DEFECT_CATEGORIES,
};

use crate::models::{ImagePayload, ImageSlot};

/// Errors surfaced by the extraction client.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// No usable credential configured and the policy forbids simulation.
    #[error("No API credential configured")]
    MissingCredential,

    /// Network, auth, or HTTP-level failure of a live call.
    #[error("Extraction service error: {0}")]
    Service(String),

    /// The service replied but the envelope was unusable.
    #[error("Unparseable service response: {0}")]
    Parse(String),
}

/// An extraction result headed for the merge engine.
///
/// Never persisted; consumed immediately and discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionUpdate {
    DefectCategory(String),
    OcLabel(OcDetails),
    FactoryLabel(FactoryDetails),
    /// Free-text analysis appended to the remark field.
    DefectAnalysis(String),
}

/// Run the extraction operation a slot capture triggers.
///
/// The defect symptom slot triggers classification only; the free-text
/// analysis is a separate, user-initiated action.
pub async fn extract_for_slot(
    client: &ExtractionClient,
    slot: ImageSlot,
    image: &ImagePayload,
) -> Result<ExtractionUpdate, ExtractError> {
    match slot {
        ImageSlot::DefectSymptom => Ok(ExtractionUpdate::DefectCategory(
            client.detect_defect_category(image).await?,
        )),
        ImageSlot::OcSerial => Ok(ExtractionUpdate::OcLabel(
            client.extract_oc_details(image).await?,
        )),
        ImageSlot::FactoryBatch => Ok(ExtractionUpdate::FactoryLabel(
            client.extract_factory_details(image).await?,
        )),
    }
}
