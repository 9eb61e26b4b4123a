use std::{mem, sync::Arc, thread};

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use gpui::prelude::FluentBuilder;
use gpui::{
    AnyElement, App, AppContext, Context, IntoElement, ObjectFit, ParentElement, Render,
    RenderImage, SharedString, Styled, StyledImage, TitlebarOptions, Window, WindowOptions, div,
    img, px,
};
use gpui_component::{
    ActiveTheme, Root, Selectable, StyledExt,
    button::{Button, ButtonVariants},
    h_flex,
    tag::Tag,
    v_flex,
};
use image::{Frame as ImageFrame, ImageBuffer, Rgba};

use crate::{
    config::QuizConfig,
    evaluator::AnswerEvaluator,
    model_download::{DownloadEvent, ensure_handpose_model_ready},
    pipeline::{self, CameraDevice, CameraStream, LatestFrame},
    pose_reference::{self, PoseReference, PoseReferenceSource},
    quiz::{QuizOutcome, QuizSession},
    types::{AnnotatedFrame, Frame},
};

mod camera_view;
mod download;
mod notices;
mod quiz_view;
mod render_util;
mod results_view;
mod title_view;

use self::notices::{Notice, NoticeBoard, NoticeKind};

const CAMERA_VIEW_WIDTH: f32 = 640.0;
const DEFAULT_CAMERA_RATIO: f32 = 4.0 / 3.0;
const SIDE_PANEL_WIDTH: f32 = 260.0;

/// Everything the window needs from `main`.
#[derive(Clone)]
pub struct UiContext {
    pub config: QuizConfig,
    pub evaluator: Arc<dyn AnswerEvaluator>,
    pub pose_reference: Arc<dyn PoseReferenceSource>,
}

pub fn launch_ui(app: &mut App, context: UiContext) -> gpui::Result<()> {
    let window_options = WindowOptions {
        titlebar: Some(TitlebarOptions {
            title: Some("Sign Quiz".into()),
            ..Default::default()
        }),
        ..Default::default()
    };

    app.open_window(window_options, move |window, app| {
        let view = app.new(|_| AppView::new(context));
        app.new(|cx| Root::new(view, window, cx))
    })?;

    Ok(())
}

struct AppView {
    screen: Screen,
    context: UiContext,
    latest_frame: LatestFrame,
    annotate_tx: Sender<Frame>,
    annotate_rx: Option<Receiver<Frame>>,
    annotated_tx: Option<Sender<AnnotatedFrame>>,
    annotated_rx: Receiver<AnnotatedFrame>,
    annotator_handle: Option<thread::JoinHandle<()>>,
    camera_stream: Option<CameraStream>,
    available_cameras: Vec<CameraDevice>,
    selected_camera_idx: Option<usize>,
    live_image: Option<Arc<RenderImage>>,
    live_size: Option<(u32, u32)>,
    still_image: Option<Arc<RenderImage>>,
    result_image: Option<Arc<RenderImage>>,
    reference_image: Option<Arc<RenderImage>>,
    reference_tx: Sender<PoseReference>,
    reference_rx: Receiver<PoseReference>,
    session: Option<QuizSession>,
    notices: NoticeBoard,
    download_rx: Receiver<DownloadMessage>,
    _download_handle: thread::JoinHandle<()>,
}

enum Screen {
    Camera(CameraState),
    Download(DownloadState),
    Title,
    Quiz,
    Results(QuizOutcome),
}

enum CameraState {
    Unavailable {
        message: String,
    },
    Selection {
        options: Vec<CameraDevice>,
        selected: usize,
        start_error: Option<String>,
    },
    Ready,
}

struct DownloadState {
    downloaded: u64,
    total: Option<u64>,
    message: String,
    error: Option<String>,
    finished: bool,
}

impl DownloadState {
    fn new() -> Self {
        Self {
            downloaded: 0,
            total: None,
            message: "모델 다운로드 준비 중...".to_string(),
            error: None,
            finished: false,
        }
    }
}

enum DownloadMessage {
    Event(DownloadEvent),
    Error(String),
}

impl AppView {
    fn new(context: UiContext) -> Self {
        let (annotate_tx, annotate_rx) = bounded(1);
        let (annotated_tx, annotated_rx) = bounded(2);
        let (reference_tx, reference_rx) = unbounded();
        let (download_tx, download_rx) = unbounded();
        let download_handle =
            download::spawn_model_download(context.config.model_path.clone(), download_tx);
        let (initial_camera_state, available_cameras) = Self::initial_camera_state();
        let selected_camera_idx = if available_cameras.is_empty() {
            None
        } else {
            Some(0)
        };

        Self {
            screen: Screen::Camera(initial_camera_state),
            context,
            latest_frame: LatestFrame::default(),
            annotate_tx,
            annotate_rx: Some(annotate_rx),
            annotated_tx: Some(annotated_tx),
            annotated_rx,
            annotator_handle: None,
            camera_stream: None,
            available_cameras,
            selected_camera_idx,
            live_image: None,
            live_size: None,
            still_image: None,
            result_image: None,
            reference_image: None,
            reference_tx,
            reference_rx,
            session: None,
            notices: NoticeBoard::default(),
            download_rx,
            _download_handle: download_handle,
        }
    }

    fn start_annotator_if_needed(&mut self) {
        if self.annotator_handle.is_some() {
            return;
        }

        let Some(frame_rx) = self.annotate_rx.take() else {
            log::warn!("missing frame receiver for annotator");
            return;
        };
        let Some(result_tx) = self.annotated_tx.take() else {
            log::warn!("missing result sender for annotator");
            return;
        };

        let model_path = self.context.config.model_path.clone();
        self.annotator_handle = Some(pipeline::start_annotator(model_path, frame_rx, result_tx));
    }

    fn start_session(&mut self) {
        let definition = match self.context.config.quiz_definition() {
            Ok(definition) => definition,
            Err(err) => {
                log::error!("cannot start quiz: {err}");
                self.push_notice(NoticeKind::Error, format!("퀴즈를 시작할 수 없습니다: {err}"));
                return;
            }
        };

        log::info!(
            "starting quiz with {} questions ({} poses)",
            definition.len(),
            definition.total_poses()
        );
        self.session = Some(QuizSession::new(
            definition,
            self.context.config.countdown_ticks,
            self.context.evaluator.clone(),
        ));
        self.request_reference(1, 1);
    }

    fn request_reference(&self, question_no: u32, pose_no: u32) {
        pose_reference::spawn_fetch(
            self.context.pose_reference.clone(),
            question_no,
            pose_no,
            self.reference_tx.clone(),
        );
    }

    fn push_notice(&mut self, kind: NoticeKind, message: impl Into<String>) {
        self.notices.push(kind, message);
    }

    fn dismiss_notice(&mut self, id: u64) {
        self.notices.dismiss(id);
    }

    /// Leaves the quiz: the camera is released before the results screen shows.
    fn finish_session(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) {
        self.stop_camera_stream();
        for slot in [
            &mut self.live_image,
            &mut self.still_image,
            &mut self.result_image,
            &mut self.reference_image,
        ] {
            render_util::replace_image(slot, None, window, cx);
        }
        self.live_size = None;
        self.notices.clear();
    }

    fn begin_quiz(&mut self) {
        self.start_session();
        self.screen = Screen::Quiz;
    }

    fn restart_quiz(&mut self) {
        let device = self
            .selected_camera_idx
            .and_then(|idx| self.available_cameras.get(idx))
            .cloned();
        if let Some(device) = device {
            if let Err(err) = self.start_camera_for_device(&device) {
                self.push_notice(NoticeKind::Error, err);
            }
        }
        self.start_session();
        self.screen = Screen::Quiz;
    }
}

impl Render for AppView {
    fn render(
        &mut self,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> impl gpui::IntoElement {
        cx.defer_in(window, |_, _, cx| {
            cx.notify();
        });

        let mut screen = mem::replace(&mut self.screen, Screen::Quiz);
        let view = match screen {
            Screen::Camera(mut state) => {
                let view = self.render_camera_view(&mut state, cx);
                match state {
                    CameraState::Ready => {
                        screen = Screen::Download(DownloadState::new());
                    }
                    _ => {
                        screen = Screen::Camera(state);
                    }
                }
                view
            }
            Screen::Download(mut state) => {
                self.poll_download_events(&mut state);
                let should_switch = state.finished && state.error.is_none();
                let view = self.render_download_view(&state, cx);
                if should_switch {
                    self.start_annotator_if_needed();
                    screen = Screen::Title;
                } else {
                    screen = Screen::Download(state);
                }
                view
            }
            Screen::Title => {
                screen = Screen::Title;
                self.render_title(cx)
            }
            Screen::Quiz => {
                let view = self.render_quiz(window, cx);
                screen = match self.session.as_ref().and_then(QuizSession::outcome) {
                    Some(outcome) => {
                        self.finish_session(window, cx);
                        Screen::Results(outcome)
                    }
                    None => Screen::Quiz,
                };
                view
            }
            Screen::Results(outcome) => {
                screen = Screen::Results(outcome);
                self.render_results(&outcome, cx)
            }
        };
        self.screen = screen;
        view
    }
}
