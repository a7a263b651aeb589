use std::{cell::RefCell, rc::Rc, sync::Arc};

use gpui::{
    AnyElement, App, AppContext, Context, IntoElement, ObjectFit, ParentElement, Render,
    RenderImage, Styled, StyledImage, TitlebarOptions, Window, WindowOptions, div, img,
};
use gpui::prelude::FluentBuilder;
use gpui_component::{Root, h_flex, v_flex};
use image::{Frame as ImageFrame, ImageBuffer, Rgba};

use crate::{
    config::Sample,
    pipeline::DisplayReceiver,
    session::SensorSession,
    types::{DisplayFormat, DisplayImage, Resolution, SkeletonOverlay},
};

mod render_util;
mod viewer_view;

const CANVAS_SIZE: Resolution = Resolution::VGA;

/// Opens the viewer window. Closing it stops `session` and quits the app.
pub fn launch_ui(
    app: &mut App,
    sample: Sample,
    session: SensorSession,
    display: DisplayReceiver,
    startup_error: Option<String>,
) -> gpui::Result<()> {
    let session = Rc::new(RefCell::new(session));
    let sensor_label = session.borrow().sensor().map(|sensor| sensor.label());

    let window_options = WindowOptions {
        titlebar: Some(TitlebarOptions {
            title: Some(format!("Kinect Viewer - {}", sample.title()).into()),
            appears_transparent: false,
            traffic_light_position: None,
        }),
        ..Default::default()
    };

    let view_session = session.clone();
    app.open_window(window_options, move |window, app| {
        let view = app.new(|_| {
            ViewerView::new(sample, view_session, sensor_label, display, startup_error)
        });
        app.new(|cx| Root::new(view, window, cx))
    })?;

    app.on_window_closed(move |app| {
        if app.windows().is_empty() {
            session.borrow_mut().stop();
            app.quit();
        }
    })
    .detach();

    Ok(())
}

struct ViewerView {
    sample: Sample,
    session: Rc<RefCell<SensorSession>>,
    sensor_label: Option<String>,
    display: DisplayReceiver,
    startup_error: Option<String>,
    last_error: Option<String>,
    latest_color: Option<DisplayImage>,
    latest_overlay: Option<SkeletonOverlay>,
    latest_image: Option<Arc<RenderImage>>,
    frames_shown: u64,
}

impl ViewerView {
    fn new(
        sample: Sample,
        session: Rc<RefCell<SensorSession>>,
        sensor_label: Option<String>,
        display: DisplayReceiver,
        startup_error: Option<String>,
    ) -> Self {
        Self {
            sample,
            session,
            sensor_label,
            display,
            startup_error,
            last_error: None,
            latest_color: None,
            latest_overlay: None,
            latest_image: None,
            frames_shown: 0,
        }
    }
}

impl Render for ViewerView {
    fn render(
        &mut self,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> impl gpui::IntoElement {
        cx.defer_in(window, |_, _, cx| {
            cx.notify();
        });

        self.poll_display(window, cx);
        self.render_viewer(cx)
    }
}
