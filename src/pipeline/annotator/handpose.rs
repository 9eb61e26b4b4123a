use std::path::Path;

use anyhow::{Context, Result, anyhow};
use fast_image_resize as fir;
use ndarray::Array4;
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;
use rayon::prelude::*;

use super::LandmarkAnnotator;
use crate::types::{Frame, HandLandmarks, LandmarkSet};

const INPUT_SIZE: u32 = 224;
const NUM_LANDMARKS: usize = 21;
/// Hands below this score are not reported.
const MIN_HAND_CONFIDENCE: f32 = 0.5;

/// Mapping from model input space back to the original frame.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
    frame_w: u32,
    frame_h: u32,
}

impl Letterbox {
    fn fit(frame_w: u32, frame_h: u32, target: u32) -> Self {
        let scale = target as f32 / frame_w.max(frame_h).max(1) as f32;
        let scaled_w = (frame_w as f32 * scale).round().max(1.0);
        let scaled_h = (frame_h as f32 * scale).round().max(1.0);
        Self {
            scale,
            pad_x: ((target as f32 - scaled_w) / 2.0).max(0.0).floor(),
            pad_y: ((target as f32 - scaled_h) / 2.0).max(0.0).floor(),
            frame_w,
            frame_h,
        }
    }

    fn scaled_size(&self) -> (u32, u32) {
        (
            (self.frame_w as f32 * self.scale).round().max(1.0) as u32,
            (self.frame_h as f32 * self.scale).round().max(1.0) as u32,
        )
    }

    fn to_frame(&self, x: f32, y: f32) -> (f32, f32) {
        let fx = (x - self.pad_x) / self.scale;
        let fy = (y - self.pad_y) / self.scale;
        (
            fx.clamp(0.0, self.frame_w.saturating_sub(1) as f32),
            fy.clamp(0.0, self.frame_h.saturating_sub(1) as f32),
        )
    }
}

/// Single-hand MediaPipe handpose estimator run over the whole letterboxed frame.
pub struct HandposeAnnotator {
    session: Session,
    resizer: fir::Resizer,
}

impl HandposeAnnotator {
    pub fn new(model_path: &Path) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(model_path)
            .with_context(|| format!("failed to load ORT session from {}", model_path.display()))?;

        Ok(Self {
            session,
            resizer: fir::Resizer::new(),
        })
    }

    fn prepare_input(&mut self, frame: &Frame) -> Result<(Array4<f32>, Letterbox)> {
        let expected_len = frame.width as usize * frame.height as usize * 4;
        if frame.rgba.len() != expected_len || expected_len == 0 {
            return Err(anyhow!(
                "frame buffer size mismatch: got {}, expected {}",
                frame.rgba.len(),
                expected_len
            ));
        }

        let letterbox = Letterbox::fit(frame.width, frame.height, INPUT_SIZE);
        let (scaled_w, scaled_h) = letterbox.scaled_size();

        let src = fir::images::Image::from_vec_u8(
            frame.width,
            frame.height,
            frame.rgba.clone(),
            fir::PixelType::U8x4,
        )?;
        let mut dst = fir::images::Image::new(scaled_w, scaled_h, fir::PixelType::U8x4);
        let options = fir::ResizeOptions::new()
            .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
        self.resizer
            .resize(&src, &mut dst, Some(&options))
            .context("fast resize failed")?;
        let scaled = dst.into_vec();

        let size = INPUT_SIZE as usize;
        let (pad_x, pad_y) = (letterbox.pad_x as usize, letterbox.pad_y as usize);
        let row_len = scaled_w as usize;
        let mut input = vec![0f32; size * size * 3];
        input
            .par_chunks_mut(size * 3)
            .enumerate()
            .skip(pad_y)
            .take(scaled_h as usize)
            .for_each(|(row, dst_row)| {
                let src_row = &scaled[(row - pad_y) * row_len * 4..][..row_len * 4];
                for (col, px) in src_row.chunks_exact(4).enumerate() {
                    let offset = (pad_x + col) * 3;
                    if offset + 2 >= dst_row.len() {
                        break;
                    }
                    dst_row[offset] = px[0] as f32 / 255.0;
                    dst_row[offset + 1] = px[1] as f32 / 255.0;
                    dst_row[offset + 2] = px[2] as f32 / 255.0;
                }
            });

        let tensor = Array4::from_shape_vec((1, size, size, 3), input)
            .map_err(|err| anyhow!("failed to build input tensor: {err}"))?;
        Ok((tensor, letterbox))
    }
}

impl LandmarkAnnotator for HandposeAnnotator {
    fn annotate(&mut self, frame: &Frame) -> Result<LandmarkSet> {
        let (input, letterbox) = self.prepare_input(frame)?;
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .context("failed to run handpose session")?;

        if outputs.len() < 2 {
            return Err(anyhow!(
                "handpose model returned {} outputs, expected at least 2",
                outputs.len()
            ));
        }

        let confidence = outputs[1]
            .try_extract_array::<f32>()?
            .iter()
            .next()
            .copied()
            .unwrap_or(0.0);
        if confidence < MIN_HAND_CONFIDENCE {
            return Ok(LandmarkSet::default());
        }

        let coords: Vec<f32> = outputs[0].try_extract_array::<f32>()?.iter().copied().collect();
        let points = project_keypoints(&coords, &letterbox)?;

        Ok(LandmarkSet {
            hands: vec![HandLandmarks { points, confidence }],
        })
    }

    fn label(&self) -> &'static str {
        "ort-handpose"
    }
}

/// Turns the flat `[x, y, z] * 21` output into frame coordinates.
fn project_keypoints(flat: &[f32], letterbox: &Letterbox) -> Result<Vec<(f32, f32)>> {
    if flat.len() < NUM_LANDMARKS * 3 {
        return Err(anyhow!(
            "unexpected landmarks length: got {}, need {}",
            flat.len(),
            NUM_LANDMARKS * 3
        ));
    }

    Ok(flat
        .chunks_exact(3)
        .take(NUM_LANDMARKS)
        .map(|xyz| letterbox.to_frame(xyz[0], xyz[1]))
        .collect())
}
