mod handpose;

use std::{path::PathBuf, thread};

use crossbeam_channel::{Receiver, Sender};

use crate::types::{AnnotatedFrame, Frame, LandmarkSet};

use self::handpose::HandposeAnnotator;

pub(crate) trait LandmarkAnnotator: Send + 'static {
    fn annotate(&mut self, frame: &Frame) -> anyhow::Result<LandmarkSet>;

    fn label(&self) -> &'static str;
}

/// Used when the handpose model cannot be loaded: frames still reach the
/// screen, just without landmarks.
pub(crate) struct PassthroughAnnotator;

impl LandmarkAnnotator for PassthroughAnnotator {
    fn annotate(&mut self, _frame: &Frame) -> anyhow::Result<LandmarkSet> {
        Ok(LandmarkSet::default())
    }

    fn label(&self) -> &'static str {
        "passthrough"
    }
}

pub fn start_annotator(
    model_path: PathBuf,
    frame_rx: Receiver<Frame>,
    result_tx: Sender<AnnotatedFrame>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || match HandposeAnnotator::new(&model_path) {
        Ok(annotator) => {
            log::info!("handpose annotator ready using {}", model_path.display());
            run_worker_loop(annotator, frame_rx, result_tx);
        }
        Err(err) => {
            log::error!(
                "failed to load handpose model at {}: {err:?}",
                model_path.display()
            );
            run_worker_loop(PassthroughAnnotator, frame_rx, result_tx);
        }
    })
}

/// Annotates the newest available frame until the camera side hangs up.
fn run_worker_loop<A: LandmarkAnnotator>(
    mut annotator: A,
    frame_rx: Receiver<Frame>,
    result_tx: Sender<AnnotatedFrame>,
) {
    log::info!("annotator worker running ({})", annotator.label());

    while let Some(frame) = recv_latest_frame(&frame_rx) {
        let landmarks = annotator.annotate(&frame).unwrap_or_else(|err| {
            log::warn!("landmark annotation failed: {err:?}");
            LandmarkSet::default()
        });
        if result_tx
            .send(AnnotatedFrame { frame, landmarks })
            .is_err()
        {
            break;
        }
    }

    log::info!("annotator worker stopped");
}

fn recv_latest_frame(frame_rx: &Receiver<Frame>) -> Option<Frame> {
    let mut frame = frame_rx.recv().ok()?;
    while let Ok(newer) = frame_rx.try_recv() {
        frame = newer;
    }
    Some(frame)
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use crossbeam_channel::unbounded;

    use super::*;
    use crate::types::HandLandmarks;

    fn frame(width: u32) -> Frame {
        Frame {
            rgba: vec![0; width as usize * 4],
            width,
            height: 1,
            timestamp: Instant::now(),
        }
    }

    struct CountingAnnotator {
        fail_on_width: u32,
    }

    impl LandmarkAnnotator for CountingAnnotator {
        fn annotate(&mut self, frame: &Frame) -> anyhow::Result<LandmarkSet> {
            if frame.width == self.fail_on_width {
                anyhow::bail!("model hiccup");
            }
            Ok(LandmarkSet {
                hands: vec![HandLandmarks {
                    points: vec![(frame.width as f32, 0.0)],
                    confidence: 1.0,
                }],
            })
        }

        fn label(&self) -> &'static str {
            "counting"
        }
    }

    #[test]
    fn backlog_collapses_to_newest_frame() {
        let (tx, rx) = unbounded();
        tx.send(frame(1)).unwrap();
        tx.send(frame(2)).unwrap();
        tx.send(frame(3)).unwrap();
        assert_eq!(recv_latest_frame(&rx).map(|f| f.width), Some(3));

        drop(tx);
        assert!(recv_latest_frame(&rx).is_none());
    }

    #[test]
    fn failed_annotation_still_forwards_frame() {
        let (frame_tx, frame_rx) = unbounded();
        let (result_tx, result_rx) = unbounded();

        frame_tx.send(frame(4)).unwrap();
        drop(frame_tx);
        run_worker_loop(CountingAnnotator { fail_on_width: 4 }, frame_rx, result_tx);

        let annotated = result_rx.recv().unwrap();
        assert_eq!(annotated.frame.width, 4);
        assert!(annotated.landmarks.is_empty());
    }

    #[test]
    fn landmarks_travel_with_their_frame() {
        let (frame_tx, frame_rx) = unbounded();
        let (result_tx, result_rx) = unbounded();

        frame_tx.send(frame(6)).unwrap();
        drop(frame_tx);
        run_worker_loop(CountingAnnotator { fail_on_width: 0 }, frame_rx, result_tx);

        let annotated = result_rx.recv().unwrap();
        assert_eq!(annotated.landmarks.hands[0].points, vec![(6.0, 0.0)]);
    }

    #[test]
    fn passthrough_reports_no_hands() {
        let mut annotator = PassthroughAnnotator;
        assert!(annotator.annotate(&frame(2)).unwrap().is_empty());
    }
}
