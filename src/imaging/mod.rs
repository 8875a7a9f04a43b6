//! Image ingestion: capture sources and normalization.

mod capture;
mod normalizer;

pub use capture::{
    ingest_clipboard, ingest_file, CameraConfig, CameraSession, CaptureError, Captured,
    ClipboardItem, CommandFrameGrabber, FrameGrabber,
};
pub use normalizer::{normalize, ImageProfile, ImagingConfig, NormalizeError};
