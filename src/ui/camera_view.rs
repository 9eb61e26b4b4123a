use super::{
    ActiveTheme, AnyElement, AppView, Button, ButtonVariants, CameraDevice, CameraState, Context,
    DownloadState, FluentBuilder, IntoElement, ParentElement, Screen, SharedString, Styled,
    StyledExt, Tag, div, h_flex, pipeline, px, v_flex,
};
use gpui::InteractiveElement;

impl AppView {
    pub(super) fn initial_camera_state() -> (CameraState, Vec<CameraDevice>) {
        match pipeline::available_cameras() {
            Ok(cameras) if cameras.is_empty() => (
                CameraState::Unavailable {
                    message: "사용할 수 있는 카메라가 없습니다".to_string(),
                },
                Vec::new(),
            ),
            Ok(cameras) => (
                CameraState::Selection {
                    options: cameras.clone(),
                    selected: 0,
                    start_error: None,
                },
                cameras,
            ),
            Err(err) => {
                log::error!("failed to enumerate cameras: {err:?}");
                (
                    CameraState::Unavailable {
                        message: format!("카메라를 찾을 수 없습니다: {err:#}"),
                    },
                    Vec::new(),
                )
            }
        }
    }

    pub(super) fn render_camera_view(
        &mut self,
        state: &mut CameraState,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        let theme = cx.theme();
        let card = match state {
            CameraState::Unavailable { message } => v_flex()
                .gap_2()
                .p_4()
                .rounded_lg()
                .border_1()
                .border_color(theme.border)
                .bg(theme.group_box)
                .child(
                    div()
                        .text_sm()
                        .text_color(theme.accent)
                        .font_semibold()
                        .child("⚠ 카메라 없음"),
                )
                .child(
                    div()
                        .text_xs()
                        .text_color(theme.muted_foreground)
                        .child("카메라 연결이나 권한 설정을 확인하세요"),
                )
                .child(div().text_color(theme.foreground).child(message.clone()))
                .into_any_element(),
            CameraState::Selection {
                options,
                selected,
                start_error,
            } => {
                // With a single camera there is nothing to choose.
                if options.len() == 1 && self.camera_stream.is_none() && start_error.is_none() {
                    match self.start_camera_for_device(&options[0]) {
                        Ok(()) => {
                            self.selected_camera_idx = Some(0);
                            *state = CameraState::Ready;
                            return div()
                                .child("카메라를 켜는 중...")
                                .into_any_element();
                        }
                        Err(err) => {
                            *start_error = Some(err);
                        }
                    }
                }

                let options = options.clone();
                let selected = *selected;
                let error = start_error.clone();
                self.render_camera_picker(&options, selected, error, cx)
            }
            CameraState::Ready => div()
                .text_sm()
                .text_color(theme.foreground)
                .child("⟳ 카메라를 켜는 중...")
                .into_any_element(),
        };

        div()
            .size_full()
            .flex()
            .items_center()
            .justify_center()
            .bg(gpui::rgb(0x1a2332))
            .child(div().w(px(450.0)).child(card))
            .into_any_element()
    }

    fn render_camera_picker(
        &mut self,
        cameras: &[CameraDevice],
        selected_idx: usize,
        error_msg: Option<String>,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        let mut picker = v_flex()
            .gap_2()
            .p_4()
            .rounded_xl()
            .bg(gpui::rgba(0x0f1419f5))
            .border_1()
            .border_color(gpui::rgba(0x2d3748ff))
            .shadow_lg()
            .child(
                h_flex()
                    .gap_2()
                    .items_center()
                    .mb_2()
                    .child(div().text_base().text_color(gpui::rgb(0xa5b4fc)).child("◉"))
                    .child(
                        div()
                            .text_sm()
                            .font_semibold()
                            .text_color(gpui::rgb(0xe2e8f0))
                            .child("카메라 선택"),
                    ),
            );

        for (idx, device) in cameras.iter().enumerate() {
            let is_selected = selected_idx == idx;
            picker = picker.child(
                h_flex()
                    .w_full()
                    .gap_3()
                    .items_center()
                    .p_3()
                    .rounded_lg()
                    .cursor_pointer()
                    .border_1()
                    .border_color(if is_selected {
                        gpui::rgba(0x64748bff)
                    } else {
                        gpui::rgba(0x33415500)
                    })
                    .on_mouse_down(
                        gpui::MouseButton::Left,
                        cx.listener(move |this, _, _, cx| {
                            this.select_camera(idx);
                            cx.notify();
                        }),
                    )
                    .child(
                        div()
                            .flex_1()
                            .text_sm()
                            .text_color(gpui::rgb(0xe2e8f0))
                            .overflow_hidden()
                            .text_ellipsis()
                            .whitespace_nowrap()
                            .child(device.label.clone()),
                    )
                    .when(is_selected, |this| {
                        this.child(div().text_sm().text_color(gpui::rgb(0xa5b4fc)).child("✓"))
                    }),
            );
        }

        if let Some(err) = error_msg {
            picker = picker.child(Tag::danger().rounded_full().child(err));
        }

        picker
            .child(
                Button::new(SharedString::from("camera-confirm"))
                    .primary()
                    .label("✓ 이 카메라 사용")
                    .w_full()
                    .mt_2()
                    .on_click(cx.listener(|this, _, _, cx| {
                        this.start_selected_camera();
                        cx.notify();
                    })),
            )
            .into_any_element()
    }

    fn select_camera(&mut self, selected: usize) {
        if let Screen::Camera(CameraState::Selection {
            options,
            selected: current,
            start_error,
        }) = &mut self.screen
        {
            if selected < options.len() {
                *current = selected;
                *start_error = None;
                self.selected_camera_idx = Some(selected);
            }
        }
    }

    pub(super) fn stop_camera_stream(&mut self) {
        if let Some(stream) = self.camera_stream.take() {
            stream.stop();
        }
    }

    pub(super) fn start_camera_for_device(&mut self, device: &CameraDevice) -> Result<(), String> {
        self.stop_camera_stream();

        pipeline::start_camera_stream(
            device.index.clone(),
            self.latest_frame.clone(),
            self.annotate_tx.clone(),
        )
        .map(|stream| {
            log::info!("using camera {}", device.label);
            self.camera_stream = Some(stream);
        })
        .map_err(|err| {
            log::error!("failed to start camera {}: {err:?}", device.label);
            format!("카메라를 시작할 수 없습니다: {err:#}")
        })
    }

    fn start_selected_camera(&mut self) {
        let selected_device = match &self.screen {
            Screen::Camera(CameraState::Selection {
                options, selected, ..
            }) => options
                .get(*selected)
                .cloned()
                .map(|device| (*selected, device)),
            _ => None,
        };

        let Some((selected_idx, device)) = selected_device else {
            if let Screen::Camera(CameraState::Selection { start_error, .. }) = &mut self.screen {
                *start_error = Some("선택한 카메라를 찾을 수 없습니다".to_string());
            }
            return;
        };

        match self.start_camera_for_device(&device) {
            Ok(()) => {
                self.selected_camera_idx = Some(selected_idx);
                self.screen = Screen::Download(DownloadState::new());
            }
            Err(err) => {
                if let Screen::Camera(CameraState::Selection { start_error, .. }) = &mut self.screen
                {
                    *start_error = Some(err);
                }
            }
        }
    }
}
