//! RMA case tracking for display panels.
//!
//! Tracks return-merchandise-authorization cases end to end: image capture
//! from files or a camera, AI-assisted field extraction from defect photos
//! and factory labels, and export to a styled spreadsheet with embedded
//! thumbnails.

pub mod cli;
pub mod config;
pub mod export;
pub mod extract;
pub mod imaging;
pub mod merge;
pub mod models;
pub mod store;
