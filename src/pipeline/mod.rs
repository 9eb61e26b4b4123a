pub mod annotator;
pub mod camera;
pub mod frame_convert;
pub mod overlay;

// Re-exports for convenience
pub use annotator::start_annotator;
pub use camera::{
    CameraDevice, CameraStream, FrameSource, LatestFrame, available_cameras, start_camera_stream,
};
