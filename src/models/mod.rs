//! Data models for the RMA tracker.

mod record;

pub use record::{ImagePayload, ImageSet, ImageSlot, RmaRecord, RmaStatus};
