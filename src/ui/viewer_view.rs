use super::render_util::display_to_image;
use super::{
    AnyElement, Arc, CANVAS_SIZE, Context, FluentBuilder, IntoElement, ObjectFit, ParentElement,
    RenderImage, Styled, StyledImage, ViewerView, Window, div, h_flex, img, v_flex,
};
use crate::{
    pipeline::compose_overlay,
    session::SessionState,
    types::DisplayImage,
};

impl ViewerView {
    pub(super) fn poll_display(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) {
        let updates = self.display.latest();
        if let Some(message) = updates.errors.into_iter().last() {
            self.last_error = Some(message);
        }

        let mut changed = false;
        if let Some(image) = updates.image {
            self.latest_color = Some(image);
            changed = true;
        }
        if let Some(overlay) = updates.overlay {
            self.latest_overlay = Some(overlay);
            changed = true;
        }
        if !changed {
            return;
        }

        let composed = match (&self.latest_color, &self.latest_overlay) {
            (Some(base), Some(overlay)) if !overlay.is_empty() => compose_overlay(base, overlay),
            (Some(base), _) => base.clone(),
            (None, Some(overlay)) => compose_overlay(
                &DisplayImage::blank(CANVAS_SIZE.width, CANVAS_SIZE.height),
                overlay,
            ),
            (None, None) => return,
        };

        if let Some(image) = display_to_image(composed) {
            self.replace_latest_image(image, window, cx);
            self.frames_shown += 1;
        }
    }

    pub(super) fn render_viewer(&self, _cx: &mut Context<'_, Self>) -> AnyElement {
        let frame_view: AnyElement = if let Some(image) = &self.latest_image {
            img(image.clone())
                .size_full()
                .object_fit(ObjectFit::Contain)
                .into_any_element()
        } else {
            let placeholder = match &self.startup_error {
                Some(err) => err.clone(),
                None => format!("Waiting for {} frames...", self.sample.title()),
            };
            div()
                .size_full()
                .flex()
                .items_center()
                .justify_center()
                .text_sm()
                .text_color(gpui::rgb(0x8b95a5))
                .child(placeholder)
                .into_any_element()
        };

        let state = match self.session.borrow().state() {
            SessionState::Uninitialized => "not started",
            SessionState::Running => "running",
            SessionState::Stopped => "stopped",
        };
        let sensor = self
            .sensor_label
            .clone()
            .unwrap_or_else(|| "no sensor".to_string());
        let frame_status = self
            .latest_color
            .as_ref()
            .map(|image| format!("{}x{}", image.width, image.height))
            .unwrap_or_else(|| "--".to_string());

        let status_bar = h_flex()
            .justify_between()
            .items_center()
            .gap_2()
            .px_3()
            .py_1()
            .text_xs()
            .text_color(gpui::rgb(0xa0aab8))
            .bg(gpui::rgb(0x1a2332))
            .child(format!("{sensor} ({state})"))
            .child(format!("{frame_status} · {} frames", self.frames_shown));

        v_flex()
            .size_full()
            .bg(gpui::rgb(0x000000))
            .child(
                div()
                    .flex_1()
                    .w_full()
                    .overflow_hidden()
                    .child(frame_view),
            )
            .when_some(self.last_error.clone(), |this, err| {
                this.child(
                    h_flex()
                        .gap_2()
                        .items_center()
                        .p_3()
                        .bg(gpui::rgba(0xef444433))
                        .border_1()
                        .border_color(gpui::rgba(0xef4444ff))
                        .child(div().text_base().child("⚠️"))
                        .child(
                            div()
                                .text_xs()
                                .text_color(gpui::rgb(0xfca5a5))
                                .child(err),
                        ),
                )
            })
            .child(status_bar)
            .into_any_element()
    }

    fn replace_latest_image(
        &mut self,
        new_image: Arc<RenderImage>,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) {
        if let Some(old_image) = self.latest_image.replace(new_image) {
            // Explicitly drop the previous GPU texture; otherwise the sprite atlas keeps
            // every frame and memory will climb rapidly while the sensor is running.
            cx.drop_image(old_image, Some(window));
        }
    }
}
