use crossbeam_channel::{Receiver, Sender, bounded, unbounded};

use crate::types::{DisplayImage, SkeletonOverlay};

/// Where rendered frames go. Implementations hand them over to whatever
/// owns the visible window.
pub trait DisplaySurface: Send + Sync {
    /// Replaces the displayed bitmap.
    fn present_image(&self, image: DisplayImage);

    /// Replaces the joint overlay drawn over the bitmap.
    fn present_overlay(&self, overlay: SkeletonOverlay);

    fn report_error(&self, message: String);
}

/// Surface backed by channels drained by the UI thread.
#[derive(Clone, Debug)]
pub struct ChannelSurface {
    image_tx: Sender<DisplayImage>,
    overlay_tx: Sender<SkeletonOverlay>,
    error_tx: Sender<String>,
}

#[derive(Debug)]
pub struct DisplayReceiver {
    pub image_rx: Receiver<DisplayImage>,
    pub overlay_rx: Receiver<SkeletonOverlay>,
    pub error_rx: Receiver<String>,
}

impl DisplayReceiver {
    /// Drains pending updates, keeping only the newest of each kind.
    pub fn latest(&self) -> DisplayUpdates {
        DisplayUpdates {
            image: self.image_rx.try_iter().last(),
            overlay: self.overlay_rx.try_iter().last(),
            errors: self.error_rx.try_iter().collect(),
        }
    }
}

#[derive(Debug, Default)]
pub struct DisplayUpdates {
    pub image: Option<DisplayImage>,
    pub overlay: Option<SkeletonOverlay>,
    pub errors: Vec<String>,
}

pub fn channel_surface() -> (ChannelSurface, DisplayReceiver) {
    let (image_tx, image_rx) = bounded(1);
    let (overlay_tx, overlay_rx) = bounded(1);
    let (error_tx, error_rx) = unbounded();

    (
        ChannelSurface {
            image_tx,
            overlay_tx,
            error_tx,
        },
        DisplayReceiver {
            image_rx,
            overlay_rx,
            error_rx,
        },
    )
}

impl DisplaySurface for ChannelSurface {
    fn present_image(&self, image: DisplayImage) {
        // Drop the frame if the UI has not picked up the previous one yet.
        let _ = self.image_tx.try_send(image);
    }

    fn present_overlay(&self, overlay: SkeletonOverlay) {
        let _ = self.overlay_tx.try_send(overlay);
    }

    fn report_error(&self, message: String) {
        let _ = self.error_tx.send(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_surface_drops_new_images() {
        let (surface, receiver) = channel_surface();
        surface.present_image(DisplayImage::blank(1, 1));
        surface.present_image(DisplayImage::blank(2, 2));

        let updates = receiver.latest();
        assert_eq!(updates.image.map(|image| image.width), Some(1));
        assert!(receiver.latest().image.is_none());
    }

    #[test]
    fn errors_are_never_dropped() {
        let (surface, receiver) = channel_surface();
        surface.report_error("first".into());
        surface.report_error("second".into());

        assert_eq!(receiver.latest().errors, vec!["first", "second"]);
    }

    #[test]
    fn surface_outliving_receiver_is_harmless() {
        let (surface, receiver) = channel_surface();
        drop(receiver);
        surface.present_overlay(SkeletonOverlay::default());
        surface.report_error("ignored".into());
    }
}
