use super::{
    ActiveTheme, AnyElement, AppView, Button, ButtonVariants, Context, IntoElement,
    ParentElement, SharedString, Styled, StyledExt, div, px, v_flex,
};
use crate::config::QuizConfig;

impl AppView {
    pub(super) fn render_title(&mut self, cx: &mut Context<'_, Self>) -> AnyElement {
        let theme = cx.theme();
        let summary = quiz_summary(&self.context.config);

        let card = v_flex()
            .w(px(450.0))
            .gap_4()
            .p_6()
            .rounded_xl()
            .border_1()
            .border_color(theme.border)
            .bg(gpui::rgba(0x0f1419f5))
            .items_center()
            .child(
                div()
                    .text_3xl()
                    .font_semibold()
                    .text_color(gpui::rgb(0xe2e8f0))
                    .child("수어 퀴즈"),
            )
            .child(
                div()
                    .text_sm()
                    .text_color(theme.muted_foreground)
                    .child("화면의 단어를 수어로 표현해 보세요"),
            )
            .child(
                div()
                    .text_sm()
                    .text_color(gpui::rgb(0xa0aab8))
                    .child(summary),
            )
            .child(
                Button::new(SharedString::from("title-start"))
                    .primary()
                    .label("시작하기")
                    .w_full()
                    .on_click(cx.listener(|this, _, _, cx| {
                        this.begin_quiz();
                        cx.notify();
                    })),
            );

        div()
            .size_full()
            .flex()
            .items_center()
            .justify_center()
            .bg(gpui::rgb(0x1a2332))
            .child(card)
            .into_any_element()
    }
}

fn quiz_summary(config: &QuizConfig) -> String {
    match config.quiz_definition() {
        Ok(definition) => format!(
            "문제 {}개 · 동작 {}개",
            definition.len(),
            definition.total_poses()
        ),
        Err(err) => format!("퀴즈 설정 오류: {err}"),
    }
}
