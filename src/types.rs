use std::{io::Cursor, time::Instant};

use anyhow::{Context, Result, anyhow};
use image::{DynamicImage, ImageFormat, RgbImage};

const SNAPSHOT_FORMAT: ImageFormat = ImageFormat::Jpeg;

#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    #[allow(dead_code)]
    pub timestamp: Instant,
}

impl Frame {
    /// Decodes an encoded image (PNG, JPEG) into an RGBA frame.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let decoded = image::load_from_memory(bytes).context("failed to decode image bytes")?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Self {
            rgba: rgba.into_raw(),
            width,
            height,
            timestamp: Instant::now(),
        })
    }

    /// Encodes the frame as the JPEG snapshot submitted for scoring.
    pub fn to_jpeg(&self) -> Result<Vec<u8>> {
        let expected_len = self.width as usize * self.height as usize * 4;
        if self.rgba.len() != expected_len || expected_len == 0 {
            return Err(anyhow!(
                "frame buffer size mismatch: got {}, expected {}",
                self.rgba.len(),
                expected_len
            ));
        }

        let rgb: Vec<u8> = self
            .rgba
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect();
        let image = RgbImage::from_raw(self.width, self.height, rgb)
            .ok_or_else(|| anyhow!("failed to wrap {}x{} frame", self.width, self.height))?;

        let mut encoded = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image)
            .write_to(&mut encoded, SNAPSHOT_FORMAT)
            .context("failed to encode snapshot")?;
        Ok(encoded.into_inner())
    }
}

/// Keypoints of one detected hand, in frame pixel coordinates.
#[derive(Clone, Debug)]
pub struct HandLandmarks {
    pub points: Vec<(f32, f32)>,
    pub confidence: f32,
}

#[derive(Clone, Debug, Default)]
pub struct LandmarkSet {
    pub hands: Vec<HandLandmarks>,
}

impl LandmarkSet {
    pub fn is_empty(&self) -> bool {
        self.hands.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct AnnotatedFrame {
    pub frame: Frame,
    pub landmarks: LandmarkSet,
}
