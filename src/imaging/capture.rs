//! Capture source adapters: file, clipboard, and camera.
//!
//! All three terminate in the normalizer. The camera is modeled as a scoped
//! hardware resource: a [`FrameGrabber`] provides the still-frame primitive
//! and a [`CameraSession`] guard guarantees the stream is released on every
//! exit path, including errors.

use std::path::Path;
use std::process::Command;

use chrono::Local;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::normalizer::{normalize, ImageProfile, NormalizeError};
use crate::models::ImagePayload;

/// Errors from capture sources.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Camera unavailable: {0}")]
    CameraUnavailable(String),

    #[error("Failed to grab frame: {0}")]
    FrameGrab(String),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A normalized capture plus the name of its source.
#[derive(Debug, Clone)]
pub struct Captured {
    pub payload: ImagePayload,
    /// Original filename, or a timestamp-synthesized name for camera frames.
    pub source_name: String,
}

/// Ingest a picked file.
///
/// Non-image files are a silent no-op (`Ok(None)`), matching the picker
/// contract: the caller simply leaves the slot unchanged.
pub fn ingest_file(path: &Path, profile: ImageProfile) -> Result<Option<Captured>, CaptureError> {
    let bytes = std::fs::read(path)?;

    match infer::get(&bytes) {
        Some(kind) if kind.mime_type().starts_with("image/") => {}
        _ => {
            debug!("Ignoring non-image file {}", path.display());
            return Ok(None);
        }
    }

    let payload = normalize(&bytes, profile)?;
    let source_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload.jpg".to_string());

    Ok(Some(Captured {
        payload,
        source_name,
    }))
}

/// A typed blob from the system clipboard.
#[derive(Debug, Clone)]
pub struct ClipboardItem {
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Ingest pasted clipboard items.
///
/// Each item whose type indicates an image is normalized independently;
/// per-item failures are logged and skipped. Callers writing the results into
/// a slot get last-one-wins semantics since every write is an overwrite.
pub fn ingest_clipboard(items: &[ClipboardItem], profile: ImageProfile) -> Vec<Captured> {
    let mut captured = Vec::new();
    for (index, item) in items.iter().enumerate() {
        if !item.mime.starts_with("image/") {
            continue;
        }
        match normalize(&item.bytes, profile) {
            Ok(payload) => captured.push(Captured {
                payload,
                source_name: format!("paste_{}.jpg", index + 1),
            }),
            Err(e) => warn!("Skipping unreadable clipboard image: {}", e),
        }
    }
    captured
}

/// Still-frame primitive for a camera stream.
///
/// `release` must be idempotent; [`CameraSession`] calls it unconditionally
/// when the session ends.
pub trait FrameGrabber {
    /// Grab the current frame as encoded image bytes.
    fn grab(&mut self) -> Result<Vec<u8>, CaptureError>;

    /// Stop the underlying stream and free the device.
    fn release(&mut self) {}
}

/// Camera configuration for the subprocess-based grabber.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Capture binary to invoke (e.g. fswebcam).
    #[serde(default = "default_camera_binary")]
    pub binary: String,
    /// Device path, passed through when set (e.g. /dev/video0).
    #[serde(default)]
    pub device: Option<String>,
    /// Requested stream resolution.
    #[serde(default = "default_resolution")]
    pub resolution: String,
}

fn default_camera_binary() -> String {
    "fswebcam".to_string()
}
fn default_resolution() -> String {
    "1280x720".to_string()
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            binary: default_camera_binary(),
            device: None,
            resolution: default_resolution(),
        }
    }
}

/// Frame grabber that shells out to a system capture binary.
#[derive(Debug)]
pub struct CommandFrameGrabber {
    config: CameraConfig,
}

impl CommandFrameGrabber {
    /// Open the device, verifying the capture binary exists first.
    pub fn open(config: CameraConfig) -> Result<Self, CaptureError> {
        if which::which(&config.binary).is_err() {
            return Err(CaptureError::CameraUnavailable(format!(
                "capture binary '{}' not found in PATH",
                config.binary
            )));
        }
        Ok(Self { config })
    }
}

impl FrameGrabber for CommandFrameGrabber {
    fn grab(&mut self) -> Result<Vec<u8>, CaptureError> {
        let frame_file = tempfile::Builder::new().suffix(".jpg").tempfile()?;
        let frame_path = frame_file.path().to_path_buf();

        let mut cmd = Command::new(&self.config.binary);
        if let Some(device) = &self.config.device {
            cmd.args(["-d", device]);
        }
        cmd.args(["-r", &self.config.resolution])
            .arg("--no-banner")
            .arg(&frame_path);

        let output = cmd.output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CaptureError::CameraUnavailable(format!(
                    "capture binary '{}' not found",
                    self.config.binary
                ))
            } else {
                CaptureError::Io(e)
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CaptureError::FrameGrab(format!(
                "{} exited with {}: {}",
                self.config.binary, output.status, stderr
            )));
        }

        let bytes = std::fs::read(&frame_path)?;
        if bytes.is_empty() {
            return Err(CaptureError::FrameGrab(
                "capture binary produced no frame data".to_string(),
            ));
        }
        Ok(bytes)
    }
}

/// Scoped camera session.
///
/// Holds the grabber for the duration of a capture interaction and releases
/// it exactly once, whether the session ends by capture, cancellation, or an
/// error unwinding through the caller.
pub struct CameraSession<G: FrameGrabber> {
    grabber: G,
    released: bool,
}

impl<G: FrameGrabber> CameraSession<G> {
    pub fn new(grabber: G) -> Self {
        Self {
            grabber,
            released: false,
        }
    }

    /// Grab the current frame and normalize it into a payload.
    ///
    /// The synthesized filename carries the capture timestamp.
    pub fn capture_still(&mut self, profile: ImageProfile) -> Result<Captured, CaptureError> {
        let bytes = self.grabber.grab()?;
        let payload = normalize(&bytes, profile)?;
        let source_name = format!(
            "capture_{}.{}",
            Local::now().format("%Y%m%d_%H%M%S"),
            payload.extension()
        );
        Ok(Captured {
            payload,
            source_name,
        })
    }

    /// Release the camera explicitly. Safe to call more than once.
    pub fn release(&mut self) {
        if !self.released {
            self.grabber.release();
            self.released = true;
        }
    }
}

impl<G: FrameGrabber> Drop for CameraSession<G> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    fn png_bytes() -> Vec<u8> {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            8,
            8,
            image::Rgb([1, 2, 3]),
        ));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    struct StubGrabber {
        frame: Result<Vec<u8>, ()>,
        released: Arc<AtomicBool>,
        release_count: Arc<AtomicUsize>,
    }

    impl FrameGrabber for StubGrabber {
        fn grab(&mut self) -> Result<Vec<u8>, CaptureError> {
            self.frame
                .clone()
                .map_err(|_| CaptureError::FrameGrab("stub failure".to_string()))
        }

        fn release(&mut self) {
            self.released.store(true, Ordering::SeqCst);
            self.release_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn stub(frame: Result<Vec<u8>, ()>) -> (StubGrabber, Arc<AtomicBool>, Arc<AtomicUsize>) {
        let released = Arc::new(AtomicBool::new(false));
        let count = Arc::new(AtomicUsize::new(0));
        (
            StubGrabber {
                frame,
                released: released.clone(),
                release_count: count.clone(),
            },
            released,
            count,
        )
    }

    #[test]
    fn test_ingest_file_image() {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(&png_bytes()).unwrap();

        let captured = ingest_file(file.path(), ImageProfile::default())
            .unwrap()
            .unwrap();
        assert_eq!(captured.payload.mime_type, "image/jpeg");
        assert!(captured.source_name.ends_with(".png"));
    }

    #[test]
    fn test_ingest_file_rejects_non_image_silently() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"%PDF-1.4 definitely not a picture").unwrap();

        let result = ingest_file(file.path(), ImageProfile::default()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_ingest_clipboard_filters_and_survives_bad_items() {
        let items = vec![
            ClipboardItem {
                mime: "text/plain".to_string(),
                bytes: b"hello".to_vec(),
            },
            ClipboardItem {
                mime: "image/png".to_string(),
                bytes: b"corrupt image data".to_vec(),
            },
            ClipboardItem {
                mime: "image/png".to_string(),
                bytes: png_bytes(),
            },
        ];

        let captured = ingest_clipboard(&items, ImageProfile::default());
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].payload.mime_type, "image/jpeg");
    }

    #[test]
    fn test_camera_session_capture_and_release() {
        let (grabber, released, count) = stub(Ok(png_bytes()));
        let mut session = CameraSession::new(grabber);

        let captured = session.capture_still(ImageProfile::default()).unwrap();
        assert!(captured.source_name.starts_with("capture_"));
        assert!(captured.source_name.ends_with(".jpg"));
        assert!(!released.load(Ordering::SeqCst));

        drop(session);
        assert!(released.load(Ordering::SeqCst));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_camera_session_releases_after_failed_capture() {
        let (grabber, released, _) = stub(Err(()));
        let mut session = CameraSession::new(grabber);

        assert!(session.capture_still(ImageProfile::default()).is_err());
        drop(session);
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn test_camera_session_release_is_idempotent() {
        let (grabber, _, count) = stub(Ok(png_bytes()));
        let mut session = CameraSession::new(grabber);
        session.release();
        session.release();
        drop(session);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_command_grabber_unavailable_binary() {
        let config = CameraConfig {
            binary: "definitely-not-a-real-capture-binary".to_string(),
            ..CameraConfig::default()
        };
        let err = CommandFrameGrabber::open(config).unwrap_err();
        assert!(matches!(err, CaptureError::CameraUnavailable(_)));
    }
}
