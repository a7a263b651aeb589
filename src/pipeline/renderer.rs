use std::sync::Arc;

use super::{
    FrameError, color::convert_color_frame, depth::colorize_depth, display::DisplaySurface,
    skeleton::{SkeletonOptions, skeleton_overlay},
};
use crate::{
    sensor::{ColorFrameReady, CoordinateMapper, DepthFrameReady, SkeletonFrameReady},
    types::{ColorStreamFormat, DepthRange, StreamKind},
};

/// Turns frame-ready notifications into display updates. Every handler
/// catches its own failures: the frame is dropped, the error is reported
/// and the stream keeps running.
pub struct FrameRenderer {
    surface: Arc<dyn DisplaySurface>,
    depth_range: DepthRange,
    color_format: ColorStreamFormat,
    mapper: Arc<dyn CoordinateMapper>,
    skeleton: SkeletonOptions,
}

impl FrameRenderer {
    pub fn new(
        surface: Arc<dyn DisplaySurface>,
        depth_range: DepthRange,
        color_format: ColorStreamFormat,
        mapper: Arc<dyn CoordinateMapper>,
        skeleton: SkeletonOptions,
    ) -> Self {
        Self {
            surface,
            depth_range,
            color_format,
            mapper,
            skeleton,
        }
    }

    pub fn on_color_frame(&self, ready: &ColorFrameReady) {
        self.report(StreamKind::Color, self.render_color(ready));
    }

    pub fn on_depth_frame(&self, ready: &DepthFrameReady) {
        self.report(StreamKind::Depth, self.render_depth(ready));
    }

    pub fn on_skeleton_frame(&self, ready: &SkeletonFrameReady) {
        self.report(StreamKind::Skeleton, self.render_skeleton(ready));
    }

    fn render_color(&self, ready: &ColorFrameReady) -> Result<(), FrameError> {
        let frame = ready.open().ok_or(FrameError::Unavailable {
            stream: StreamKind::Color,
        })?;
        let image = convert_color_frame(&frame)?;
        log::trace!("color frame #{} converted", frame.frame_number);
        drop(frame);

        self.surface.present_image(image);
        Ok(())
    }

    fn render_depth(&self, ready: &DepthFrameReady) -> Result<(), FrameError> {
        let (samples, width, height) = {
            let frame = ready.open().ok_or(FrameError::Unavailable {
                stream: StreamKind::Depth,
            })?;
            let mut samples = vec![0u16; frame.pixel_data_len()];
            frame.copy_pixel_data_to(&mut samples)?;
            log::trace!("depth frame #{} copied", frame.frame_number);
            (samples, frame.width, frame.height)
        };

        let image = colorize_depth(&samples, width, height, &self.depth_range)?;
        self.surface.present_image(image);
        Ok(())
    }

    fn render_skeleton(&self, ready: &SkeletonFrameReady) -> Result<(), FrameError> {
        let frame = ready.open().ok_or(FrameError::Unavailable {
            stream: StreamKind::Skeleton,
        })?;
        let overlay = skeleton_overlay(
            &frame.skeletons,
            self.mapper.as_ref(),
            self.color_format,
            &self.skeleton,
        );
        log::trace!(
            "skeleton frame #{}: {} marker(s)",
            frame.frame_number,
            overlay.markers.len()
        );
        drop(frame);

        self.surface.present_overlay(overlay);
        Ok(())
    }

    fn report(&self, stream: StreamKind, result: Result<(), FrameError>) {
        match result {
            Ok(()) => {}
            Err(FrameError::Unavailable { .. }) => {
                log::debug!("{} frame already released, skipping", stream.label());
            }
            Err(err) => {
                log::warn!("dropping {} frame: {err}", stream.label());
                self.surface.report_error(err.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        pipeline::display::channel_surface,
        sensor::{FrameReady, PinholeMapper},
        types::{
            ColorImageFormat, ColorImageFrame, DepthImageFrame, DisplayFormat, JointTrackingState,
            Skeleton, SkeletonFrame, SkeletonTrackingState,
        },
    };
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Instant,
    };

    fn renderer() -> (FrameRenderer, crate::pipeline::DisplayReceiver) {
        let (surface, receiver) = channel_surface();
        let renderer = FrameRenderer::new(
            Arc::new(surface),
            DepthRange::default(),
            ColorStreamFormat::RGB_640X480_FPS30,
            Arc::new(PinholeMapper::KINECT_COLOR),
            SkeletonOptions::default(),
        );
        (renderer, receiver)
    }

    fn color_frame(len: usize) -> ColorImageFrame {
        ColorImageFrame {
            pixels: vec![9; len],
            width: 2,
            height: 2,
            format: ColorImageFormat::Bgr32,
            frame_number: 1,
            timestamp: Instant::now(),
        }
    }

    #[test]
    fn color_frame_is_presented() {
        let (renderer, receiver) = renderer();
        renderer.on_color_frame(&FrameReady::unpooled(color_frame(16)));

        let updates = receiver.latest();
        let image = updates.image.expect("image presented");
        assert_eq!(image.format, DisplayFormat::Bgra32);
        assert_eq!((image.width, image.height), (2, 2));
        assert!(updates.errors.is_empty());
    }

    #[test]
    fn malformed_frame_is_reported_and_released() {
        let (renderer, receiver) = renderer();
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let ready = FrameReady::new(
            color_frame(15),
            Arc::new(move |_frame: ColorImageFrame| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        renderer.on_color_frame(&ready);

        assert_eq!(released.load(Ordering::SeqCst), 1);
        let updates = receiver.latest();
        assert!(updates.image.is_none());
        assert_eq!(updates.errors.len(), 1);

        // The stream carries on with the next frame.
        renderer.on_color_frame(&FrameReady::unpooled(color_frame(16)));
        assert!(receiver.latest().image.is_some());
    }

    #[test]
    fn already_opened_frame_is_skipped_silently() {
        let (renderer, receiver) = renderer();
        let ready = FrameReady::unpooled(color_frame(16));
        let _held = ready.open();

        renderer.on_color_frame(&ready);

        let updates = receiver.latest();
        assert!(updates.image.is_none());
        assert!(updates.errors.is_empty());
    }

    #[test]
    fn depth_frame_is_colorized() {
        let (renderer, receiver) = renderer();
        let frame = DepthImageFrame {
            pixels: vec![0, 4095 << 3, 0x1FFF << 3, 2000 << 3],
            width: 2,
            height: 2,
            frame_number: 1,
            timestamp: Instant::now(),
        };
        renderer.on_depth_frame(&FrameReady::unpooled(frame));

        let image = receiver.latest().image.expect("depth image");
        assert_eq!(&image.pixels[0..4], &[0, 255, 0, 255]);
        assert_eq!(&image.pixels[4..8], &[255, 0, 0, 255]);
        assert_eq!(&image.pixels[8..12], &[0, 0, 255, 255]);
    }

    #[test]
    fn skeleton_frame_replaces_overlay() {
        let (renderer, receiver) = renderer();
        let mut tracked = Skeleton::untracked();
        tracked.tracking_state = SkeletonTrackingState::Tracked;
        tracked.joints[0].tracking_state = JointTrackingState::Tracked;
        tracked.joints[0].position.z = 2.0;

        let frame = SkeletonFrame {
            skeletons: vec![tracked, Skeleton::untracked()],
            frame_number: 1,
            timestamp: Instant::now(),
        };
        renderer.on_skeleton_frame(&FrameReady::unpooled(frame));

        let overlay = receiver.latest().overlay.expect("overlay");
        assert_eq!(overlay.markers.len(), 1);
        assert_eq!(overlay.markers[0].center, (320.0, 240.0));
    }
}
