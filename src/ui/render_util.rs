use super::{App, Arc, ImageBuffer, ImageFrame, RenderImage, Rgba, Window};
use crate::{
    pipeline::overlay::draw_landmarks,
    types::{Frame, LandmarkSet},
};

pub(super) fn frame_to_image(
    frame: &Frame,
    landmarks: Option<&LandmarkSet>,
) -> Option<Arc<RenderImage>> {
    let mut rgba = frame.rgba.clone();
    if let Some(landmarks) = landmarks {
        draw_landmarks(&mut rgba, frame.width, frame.height, landmarks);
    }

    // GPUI expects BGRA; convert in place to avoid the async asset pipeline and flicker.
    for px in rgba.chunks_exact_mut(4) {
        px.swap(0, 2);
    }

    let buffer = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(frame.width, frame.height, rgba)?;
    Some(Arc::new(RenderImage::new(vec![ImageFrame::new(buffer)])))
}

/// Swaps the image in `slot`, releasing the old texture. The sprite atlas keeps
/// every frame otherwise and memory climbs while the camera runs.
pub(super) fn replace_image(
    slot: &mut Option<Arc<RenderImage>>,
    image: Option<Arc<RenderImage>>,
    window: &mut Window,
    cx: &mut App,
) {
    if let Some(old_image) = std::mem::replace(slot, image) {
        cx.drop_image(old_image, Some(window));
    }
}
