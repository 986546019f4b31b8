use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use thiserror::Error;

pub const DATA_URL_JPEG_PREFIX: &str = "data:image/jpeg;base64,";

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),
    #[error("frame buffer size mismatch: expected {expected} bytes, got {actual}")]
    InvalidFrameBuffer { expected: usize, actual: usize },
    #[error("jpeg encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// One RGBA frame pulled from a camera. Row-major, 4 bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl VideoFrame {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, CaptureError> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(CaptureError::InvalidFrameBuffer {
                expected,
                actual: rgba.len(),
            });
        }
        Ok(Self {
            width,
            height,
            rgba,
        })
    }

    /// Horizontal flip. Webcams deliver a non-mirrored view; the gate UI and
    /// the validation endpoint both expect the mirrored orientation the
    /// operator sees on screen.
    pub fn mirrored(&self) -> Self {
        let width = self.width as usize;
        let mut rgba = vec![0u8; self.rgba.len()];
        for row in 0..self.height as usize {
            let row_start = row * width * 4;
            for col in 0..width {
                let src = row_start + col * 4;
                let dst = row_start + (width - 1 - col) * 4;
                rgba[dst..dst + 4].copy_from_slice(&self.rgba[src..src + 4]);
            }
        }
        Self {
            width: self.width,
            height: self.height,
            rgba,
        }
    }
}

/// Encode a frame as a JPEG data URL, the wire form the validation endpoint
/// accepts in `image_b64`. JPEG carries no alpha channel, so the frame is
/// flattened to RGB first.
pub fn encode_jpeg_data_url(frame: &VideoFrame, quality: u8) -> Result<String, CaptureError> {
    let mut rgb = Vec::with_capacity(frame.rgba.len() / 4 * 3);
    for pixel in frame.rgba.chunks_exact(4) {
        rgb.extend_from_slice(&pixel[..3]);
    }
    let mut jpeg = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100));
    encoder.encode(
        &rgb,
        frame.width,
        frame.height,
        image::ExtendedColorType::Rgb8,
    )?;
    Ok(format!("{DATA_URL_JPEG_PREFIX}{}", STANDARD.encode(jpeg)))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraOptions {
    pub device_index: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for CameraOptions {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: 640,
            height: 480,
        }
    }
}

/// An opened camera stream. Implementations wrap a platform capture backend;
/// `TestPatternSource` below covers headless and test runs.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn next_frame(&self) -> anyhow::Result<VideoFrame>;
    fn label(&self) -> &str;
}

/// Opens a camera. An `Err` from `open` is the "permission denied or device
/// missing" outcome and maps to a configuration error upstream.
#[async_trait]
pub trait CameraConnector: Send + Sync {
    async fn open(&self, options: CameraOptions) -> anyhow::Result<Arc<dyn FrameSource>>;
}

/// Deterministic synthetic frames: a horizontal gradient with a moving
/// scanline so successive frames differ. Used by the headless runner and by
/// tests that need a real frame without camera hardware.
pub struct TestPatternSource {
    width: u32,
    height: u32,
    frame_counter: AtomicU64,
}

impl TestPatternSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame_counter: AtomicU64::new(0),
        }
    }

    pub fn frames_produced(&self) -> u64 {
        self.frame_counter.load(Ordering::Relaxed)
    }
}

impl Default for TestPatternSource {
    fn default() -> Self {
        Self::new(640, 480)
    }
}

#[async_trait]
impl FrameSource for TestPatternSource {
    async fn next_frame(&self) -> anyhow::Result<VideoFrame> {
        let tick = self.frame_counter.fetch_add(1, Ordering::Relaxed);
        let scanline = (tick % self.height as u64) as usize;
        let mut rgba = Vec::with_capacity(self.width as usize * self.height as usize * 4);
        for row in 0..self.height as usize {
            for col in 0..self.width as usize {
                let shade = (col * 255 / self.width.max(1) as usize) as u8;
                if row == scanline {
                    rgba.extend_from_slice(&[255, 255, 255, 255]);
                } else {
                    rgba.extend_from_slice(&[shade, shade, shade, 255]);
                }
            }
        }
        Ok(VideoFrame {
            width: self.width,
            height: self.height,
            rgba,
        })
    }

    fn label(&self) -> &str {
        "test-pattern"
    }
}

/// Connector producing synthetic sources. The default backend for demo and
/// headless deployments; platform camera backends plug in through the same
/// trait.
pub struct TestPatternCamera;

#[async_trait]
impl CameraConnector for TestPatternCamera {
    async fn open(&self, options: CameraOptions) -> anyhow::Result<Arc<dyn FrameSource>> {
        Ok(Arc::new(TestPatternSource::new(options.width, options.height)))
    }
}

/// Null object for contexts where no camera was wired up, mirroring how a
/// misconfigured kiosk should fail: loudly, at first capture.
pub struct MissingCamera;

#[async_trait]
impl CameraConnector for MissingCamera {
    async fn open(&self, _options: CameraOptions) -> anyhow::Result<Arc<dyn FrameSource>> {
        Err(CaptureError::CameraUnavailable("no camera backend configured".to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_by_one(left: [u8; 4], right: [u8; 4]) -> VideoFrame {
        let mut rgba = left.to_vec();
        rgba.extend_from_slice(&right);
        VideoFrame::new(2, 1, rgba).expect("frame")
    }

    #[test]
    fn mirroring_swaps_pixels_within_a_row() {
        let frame = two_by_one([10, 20, 30, 255], [200, 210, 220, 255]);
        let mirrored = frame.mirrored();
        assert_eq!(&mirrored.rgba[0..4], &[200, 210, 220, 255]);
        assert_eq!(&mirrored.rgba[4..8], &[10, 20, 30, 255]);
    }

    #[test]
    fn mirroring_twice_restores_the_frame() {
        let frame = two_by_one([1, 2, 3, 255], [4, 5, 6, 255]);
        assert_eq!(frame.mirrored().mirrored(), frame);
    }

    #[test]
    fn rejects_mismatched_buffer_sizes() {
        let err = VideoFrame::new(2, 2, vec![0u8; 3]).expect_err("must fail");
        match err {
            CaptureError::InvalidFrameBuffer { expected, actual } => {
                assert_eq!(expected, 16);
                assert_eq!(actual, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn encodes_frames_as_jpeg_data_urls() {
        let frame = two_by_one([255, 0, 0, 255], [0, 0, 255, 255]);
        let data_url = encode_jpeg_data_url(&frame, 80).expect("encode");
        let payload = data_url
            .strip_prefix(DATA_URL_JPEG_PREFIX)
            .expect("data url prefix");
        let bytes = STANDARD.decode(payload).expect("base64 payload");
        // JPEG start-of-image marker.
        assert_eq!(&bytes[0..2], &[0xFF, 0xD8]);
    }

    #[tokio::test]
    async fn test_pattern_source_produces_distinct_consecutive_frames() {
        let source = TestPatternSource::new(8, 8);
        let first = source.next_frame().await.expect("first frame");
        let second = source.next_frame().await.expect("second frame");
        assert_ne!(first, second);
        assert_eq!(source.frames_produced(), 2);
    }

    #[tokio::test]
    async fn test_pattern_camera_opens_at_requested_size() {
        let source = TestPatternCamera
            .open(CameraOptions {
                device_index: 0,
                width: 32,
                height: 16,
            })
            .await
            .expect("open");
        assert_eq!(source.label(), "test-pattern");
        let frame = source.next_frame().await.expect("frame");
        assert_eq!((frame.width, frame.height), (32, 16));
    }

    #[tokio::test]
    async fn missing_camera_fails_to_open() {
        let err = MissingCamera
            .open(CameraOptions::default())
            .await
            .err()
            .expect("must fail");
        assert!(err.to_string().contains("camera unavailable"));
    }
}
