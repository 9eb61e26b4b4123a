use super::{
    ActiveTheme, AnyElement, AppView, Button, ButtonVariants, Context, IntoElement,
    ParentElement, QuizOutcome, SharedString, Styled, StyledExt, div, h_flex, px, v_flex,
};

impl AppView {
    pub(super) fn render_results(
        &mut self,
        outcome: &QuizOutcome,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        let theme = cx.theme();
        let percent = outcome.score_percent();
        let verdict = match percent {
            100 => "완벽해요!",
            70..=99 => "잘했어요!",
            _ => "조금 더 연습해 봐요",
        };

        let stat = |label: &str, value: String| {
            v_flex()
                .flex_1()
                .gap_1()
                .items_center()
                .p_3()
                .rounded_md()
                .bg(gpui::rgb(0x2d3748))
                .child(
                    div()
                        .text_xs()
                        .text_color(gpui::rgb(0xa0aab8))
                        .child(label.to_string()),
                )
                .child(
                    div()
                        .text_xl()
                        .font_semibold()
                        .text_color(gpui::rgb(0xe2e8f0))
                        .child(value),
                )
        };

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
                    .text_2xl()
                    .font_semibold()
                    .text_color(gpui::rgb(0xe2e8f0))
                    .child("퀴즈 결과"),
            )
            .child(
                div()
                    .text_3xl()
                    .font_semibold()
                    .text_color(theme.success)
                    .child(format!("{percent}%")),
            )
            .child(
                div()
                    .text_sm()
                    .text_color(theme.muted_foreground)
                    .child(verdict),
            )
            .child(
                h_flex()
                    .w_full()
                    .gap_3()
                    .child(stat(
                        "맞춘 동작",
                        format!("{}/{}", outcome.correct_answers, outcome.total_poses),
                    ))
                    .child(stat("전체 문제", outcome.total_questions.to_string())),
            )
            .child(
                Button::new(SharedString::from("results-restart"))
                    .primary()
                    .label("다시 하기")
                    .w_full()
                    .on_click(cx.listener(|this, _, _, cx| {
                        this.restart_quiz();
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
