use std::time::Instant;

use super::render_util::{frame_to_image, replace_image};
use super::{
    ActiveTheme, AnyElement, AppView, Arc, Button, ButtonVariants, CAMERA_VIEW_WIDTH, Context,
    DEFAULT_CAMERA_RATIO, FluentBuilder, IntoElement, Notice, NoticeKind, ObjectFit,
    ParentElement, RenderImage, SIDE_PANEL_WIDTH, Selectable, SharedString, Styled, StyledExt,
    StyledImage, Window, div, h_flex, img, px, v_flex,
};
use crate::quiz::{Phase, SessionEvent, score_percent};

impl AppView {
    pub(super) fn render_quiz(
        &mut self,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        self.drain_annotated_frames(window, cx);
        self.drain_pose_references(window, cx);

        let now = Instant::now();
        let events = match self.session.as_mut() {
            Some(session) => session.poll(now, &self.latest_frame),
            None => Vec::new(),
        };
        for event in events {
            self.handle_session_event(event, window, cx);
        }

        let Some(session) = self.session.as_ref() else {
            return div()
                .size_full()
                .flex()
                .items_center()
                .justify_center()
                .child("퀴즈를 불러오는 중...")
                .into_any_element();
        };

        let progress = session.progress();
        let definition = session.definition();
        let prompt = session
            .current_question()
            .map(|q| q.prompt.clone())
            .unwrap_or_default();
        let poses = session.poses_in_current_question();
        let total_poses = definition.total_poses();
        let total_questions = definition.len();
        let countdown = session.countdown_remaining();
        let celebrating = session.is_celebrating(now);
        let controls = Controls::for_phase(session.phase());

        let header = h_flex()
            .w_full()
            .h(px(60.0))
            .gap_4()
            .items_center()
            .justify_between()
            .child(
                div()
                    .text_2xl()
                    .font_semibold()
                    .text_color(gpui::rgb(0xe2e8f0))
                    .child(format!("문제 {}.", progress.question_index)),
            )
            .child(
                div()
                    .flex_1()
                    .h_full()
                    .flex()
                    .items_center()
                    .justify_center()
                    .rounded_md()
                    .bg(gpui::rgb(0x2d3748))
                    .font_semibold()
                    .text_color(gpui::rgb(0xe2e8f0))
                    .child(prompt),
            );

        let steps = (1..=poses).fold(h_flex().gap_2(), |row, step| {
            row.child(
                Button::new(SharedString::from(format!("pose-step-{step}")))
                    .outline()
                    .selected(step == progress.pose_index)
                    .label(format!("STEP {step}")),
            )
        });

        let score_row = h_flex()
            .w_full()
            .justify_between()
            .items_center()
            .child(
                div()
                    .text_sm()
                    .text_color(gpui::rgb(0xa0aab8))
                    .child(format!(
                        "맞춘 문제 수: {}/{} ({}%)",
                        progress.correct_answers,
                        total_poses,
                        score_percent(progress.correct_answers, total_poses)
                    )),
            )
            .child(steps);

        let answered_fraction = if total_questions == 0 {
            0.0
        } else {
            progress.answered_questions as f32 / total_questions as f32
        };
        let progress_bar = div()
            .w(px(CAMERA_VIEW_WIDTH))
            .h(px(6.0))
            .rounded_full()
            .bg(gpui::rgb(0x2d3748))
            .child(
                div()
                    .h_full()
                    .rounded_full()
                    .bg(cx.theme().success)
                    .w(px(CAMERA_VIEW_WIDTH * answered_fraction.clamp(0.0, 1.0))),
            );

        let camera_height = CAMERA_VIEW_WIDTH / self.camera_aspect_ratio();
        let shown_image = self.still_image.as_ref().or(self.live_image.as_ref());
        let feed: AnyElement = match shown_image {
            Some(image) => img(image.clone())
                .size_full()
                .object_fit(ObjectFit::Contain)
                .into_any_element(),
            None => div()
                .size_full()
                .flex()
                .items_center()
                .justify_center()
                .text_sm()
                .text_color(gpui::rgb(0x8b95a5))
                .child("카메라 화면을 기다리는 중...")
                .into_any_element(),
        };

        let camera_box = div()
            .relative()
            .w(px(CAMERA_VIEW_WIDTH))
            .h(px(camera_height))
            .rounded_md()
            .overflow_hidden()
            .bg(gpui::rgb(0x000000))
            .child(feed)
            .when_some(countdown, |this, remaining| {
                this.child(
                    div()
                        .absolute()
                        .top(px(camera_height / 2.0 - 48.0))
                        .left(px(CAMERA_VIEW_WIDTH / 2.0 - 48.0))
                        .w(px(96.0))
                        .h(px(96.0))
                        .rounded_full()
                        .flex()
                        .items_center()
                        .justify_center()
                        .bg(gpui::rgba(0x00000080))
                        .text_3xl()
                        .text_color(gpui::rgb(0xffffff))
                        .child(remaining.to_string()),
                )
            })
            .when(celebrating, |this| {
                this.child(
                    div()
                        .absolute()
                        .top(px(16.0))
                        .left(px(16.0))
                        .px_3()
                        .py_2()
                        .rounded_lg()
                        .bg(gpui::rgba(0x16a34acc))
                        .text_lg()
                        .text_color(gpui::rgb(0xffffff))
                        .child("🎉 🎊 정답! 🎊 🎉"),
                )
            });

        let side_panel = v_flex()
            .w(px(SIDE_PANEL_WIDTH))
            .gap_3()
            .child(self.render_thumbnail("참고 동작", self.reference_image.clone(), "참고 이미지 없음"))
            .child(self.render_thumbnail("채점 결과", self.result_image.clone(), "아직 없음"));

        v_flex()
            .size_full()
            .gap_3()
            .p_5()
            .items_center()
            .bg(gpui::rgb(0x1a2332))
            .child(header)
            .child(score_row)
            .child(progress_bar)
            .child(self.render_notices(cx))
            .child(
                h_flex()
                    .gap_4()
                    .items_start()
                    .child(camera_box)
                    .child(side_panel),
            )
            .child(self.render_controls(controls, cx))
            .into_any_element()
    }

    fn render_controls(&self, controls: Controls, cx: &mut Context<'_, Self>) -> AnyElement {
        let skip = Button::new(SharedString::from("quiz-skip"))
            .outline()
            .label("건너뛰기")
            .on_click(cx.listener(|this, _, window, cx| {
                this.skip_question(window, cx);
                cx.notify();
            }));

        let status = |text: &str| {
            div()
                .text_sm()
                .text_color(gpui::rgb(0xa0aab8))
                .child(text.to_string())
        };

        let primary: AnyElement = match controls {
            Controls::Capture => Button::new(SharedString::from("quiz-capture"))
                .primary()
                .label("사진 찍기")
                .on_click(cx.listener(|this, _, _, cx| {
                    if let Some(session) = this.session.as_mut() {
                        session.start_countdown(Instant::now());
                    }
                    cx.notify();
                }))
                .into_any_element(),
            Controls::Counting => status("자세를 잡으세요...").into_any_element(),
            Controls::Evaluating => status("채점 중...").into_any_element(),
            Controls::Retry => Button::new(SharedString::from("quiz-retry"))
                .primary()
                .label("다시 하기")
                .on_click(cx.listener(|this, _, window, cx| {
                    this.retry_pose(window, cx);
                    cx.notify();
                }))
                .into_any_element(),
            Controls::Done => status("퀴즈 완료").into_any_element(),
        };

        h_flex()
            .gap_3()
            .items_center()
            .child(primary)
            .when(controls != Controls::Done, |this| this.child(skip))
            .into_any_element()
    }

    fn render_thumbnail(
        &self,
        title: &str,
        image: Option<Arc<RenderImage>>,
        placeholder: &str,
    ) -> AnyElement {
        let body: AnyElement = match image {
            Some(image) => img(image)
                .size_full()
                .object_fit(ObjectFit::Contain)
                .into_any_element(),
            None => div()
                .size_full()
                .flex()
                .items_center()
                .justify_center()
                .text_xs()
                .text_color(gpui::rgb(0x4a5568))
                .child(placeholder.to_string())
                .into_any_element(),
        };

        v_flex()
            .gap_1()
            .child(
                div()
                    .text_xs()
                    .text_color(gpui::rgb(0xa0aab8))
                    .child(title.to_string()),
            )
            .child(
                div()
                    .w(px(SIDE_PANEL_WIDTH))
                    .h(px(SIDE_PANEL_WIDTH / DEFAULT_CAMERA_RATIO))
                    .rounded_md()
                    .overflow_hidden()
                    .bg(gpui::rgb(0x0f1419))
                    .child(body),
            )
            .into_any_element()
    }

    fn render_notices(&self, cx: &mut Context<'_, Self>) -> AnyElement {
        self.notices
            .iter()
            .fold(v_flex().w(px(CAMERA_VIEW_WIDTH)).gap_2(), |list, notice| {
                list.child(render_notice(notice, cx))
            })
            .into_any_element()
    }

    fn handle_session_event(
        &mut self,
        event: SessionEvent,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) {
        match event {
            SessionEvent::CountdownTick(_) => {}
            SessionEvent::Captured => {
                self.notices.clear_transient();
                let still = match self.session.as_ref().map(|s| s.phase()) {
                    Some(Phase::Evaluating { image, .. }) => frame_to_image(image, None),
                    _ => None,
                };
                replace_image(&mut self.still_image, still, window, cx);
            }
            SessionEvent::Correct { annotated_image } => {
                let result = annotated_image
                    .as_ref()
                    .and_then(|frame| frame_to_image(frame, None));
                replace_image(&mut self.result_image, result, window, cx);
                replace_image(&mut self.still_image, None, window, cx);
                self.push_notice(NoticeKind::Success, "정답입니다!");
            }
            SessionEvent::Incorrect => {
                self.show_capture(window, cx);
                self.push_notice(NoticeKind::Info, "아쉬워요! 다시 하거나 건너뛸 수 있어요.");
            }
            SessionEvent::EvaluationFailed(message) => {
                self.show_capture(window, cx);
                self.push_notice(NoticeKind::Error, format!("채점에 실패했습니다: {message}"));
            }
            SessionEvent::MissingAnnotation => {
                self.push_notice(NoticeKind::Info, "채점 결과 이미지가 없습니다.");
            }
            SessionEvent::PoseChanged {
                question_no,
                pose_no,
            } => {
                replace_image(&mut self.still_image, None, window, cx);
                replace_image(&mut self.reference_image, None, window, cx);
                self.request_reference(question_no, pose_no);
            }
            SessionEvent::Completed(_) => {}
        }
    }

    /// Freezes the screen on the capture that was just judged.
    fn show_capture(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) {
        let capture = self
            .session
            .as_ref()
            .and_then(|s| s.capture())
            .and_then(|capture| frame_to_image(capture.display_image(), None));
        replace_image(&mut self.result_image, capture.clone(), window, cx);
        replace_image(&mut self.still_image, capture, window, cx);
    }

    fn retry_pose(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) {
        let retried = self.session.as_mut().is_some_and(|s| s.retry());
        if retried {
            replace_image(&mut self.still_image, None, window, cx);
        }
    }

    fn skip_question(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) {
        let events = match self.session.as_mut() {
            Some(session) => session.skip_question(),
            None => return,
        };
        for event in events {
            self.handle_session_event(event, window, cx);
        }
    }

    fn drain_annotated_frames(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) {
        let mut newest = None;
        while let Ok(annotated) = self.annotated_rx.try_recv() {
            newest = Some(annotated);
        }
        let Some(annotated) = newest else {
            return;
        };

        self.live_size = Some((annotated.frame.width, annotated.frame.height));
        if let Some(image) = frame_to_image(&annotated.frame, Some(&annotated.landmarks)) {
            replace_image(&mut self.live_image, Some(image), window, cx);
        }
    }

    fn drain_pose_references(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) {
        let current = self
            .session
            .as_ref()
            .map(|s| (s.progress().question_index, s.progress().pose_index));

        while let Ok(reference) = self.reference_rx.try_recv() {
            // Late answers for a pose we already left are dropped.
            if current != Some((reference.question_no, reference.pose_no)) {
                continue;
            }
            let image = frame_to_image(&reference.image, None);
            replace_image(&mut self.reference_image, image, window, cx);
        }
    }

    fn camera_aspect_ratio(&self) -> f32 {
        match self.live_size {
            Some((width, height)) if height > 0 => width as f32 / height as f32,
            _ => DEFAULT_CAMERA_RATIO,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Controls {
    Capture,
    Counting,
    Evaluating,
    Retry,
    Done,
}

impl Controls {
    fn for_phase(phase: &Phase) -> Self {
        match phase {
            Phase::Ready => Self::Capture,
            Phase::CountingDown(_) => Self::Counting,
            Phase::Evaluating { .. } => Self::Evaluating,
            Phase::WrongAnswer => Self::Retry,
            Phase::Finished(_) => Self::Done,
        }
    }
}

fn render_notice(notice: &Notice, cx: &mut Context<'_, AppView>) -> AnyElement {
    let (icon, bg, border, text) = match notice.kind {
        NoticeKind::Success => ("✓", 0x16a34a33, 0x16a34aff, 0xbbf7d0),
        NoticeKind::Info => ("ℹ", 0x2563eb33, 0x2563ebff, 0xbfdbfe),
        NoticeKind::Error => ("⚠", 0xef444433, 0xef4444ff, 0xfca5a5),
    };
    let id = notice.id;

    h_flex()
        .w_full()
        .gap_2()
        .items_center()
        .justify_between()
        .p_2()
        .rounded_lg()
        .bg(gpui::rgba(bg))
        .border_1()
        .border_color(gpui::rgba(border))
        .child(
            div()
                .flex_1()
                .text_xs()
                .text_color(gpui::rgb(text))
                .child(format!("{icon} {}", notice.message)),
        )
        .child(
            Button::new(SharedString::from(format!("notice-close-{id}")))
                .ghost()
                .label("×")
                .on_click(cx.listener(move |this, _, _, cx| {
                    this.dismiss_notice(id);
                    cx.notify();
                })),
        )
        .into_any_element()
}
