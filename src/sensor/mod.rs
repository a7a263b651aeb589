pub mod events;
pub mod pool;
pub mod stream;
pub mod synthetic;
#[cfg(feature = "camera-nokhwa")]
pub mod webcam;

use std::sync::Arc;

use thiserror::Error;

use crate::types::{
    ColorImagePoint, ColorStreamFormat, DepthRange, DepthStreamFormat, SkeletonPoint, StreamKind,
};

pub use events::{
    ColorFrameReady, DepthFrameReady, FrameEvent, FrameReady, OpenFrame, SensorEvents,
    SkeletonFrameReady, Subscription,
};

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("no sensor found, connect a depth camera and try again")]
    NoSensor,
    #[error("{sensor} does not provide a {} stream", .stream.label())]
    StreamUnsupported { sensor: String, stream: StreamKind },
    #[error("unsupported {} stream format: {detail}", .stream.label())]
    InvalidFormat { stream: StreamKind, detail: String },
    #[error("sensor is already running")]
    AlreadyRunning,
    #[error("sensor device failure: {0:#}")]
    Device(#[from] anyhow::Error),
}

/// A depth camera as seen by a session. Streams are enabled before
/// [`Sensor::start`]; frames are then raised on [`Sensor::events`] from one
/// thread per stream until [`Sensor::stop`]. Dropping the sensor releases
/// the device.
pub trait Sensor: Send {
    fn label(&self) -> String;

    fn enable_color_stream(&mut self, format: ColorStreamFormat) -> Result<(), SensorError>;

    fn enable_depth_stream(&mut self, format: DepthStreamFormat) -> Result<(), SensorError>;

    fn enable_skeleton_stream(&mut self) -> Result<(), SensorError>;

    fn color_format(&self) -> Option<ColorStreamFormat>;

    fn depth_range(&self) -> DepthRange;

    fn events(&self) -> &SensorEvents;

    fn is_running(&self) -> bool;

    fn start(&mut self) -> Result<(), SensorError>;

    /// Halts frame delivery; calling it on a stopped sensor does nothing.
    fn stop(&mut self);

    fn coordinate_mapper(&self) -> Arc<dyn CoordinateMapper>;
}

/// Device discovery.
pub trait SensorProvider {
    fn sensors(&self) -> Result<Vec<Box<dyn Sensor>>, SensorError>;
}

/// Calibration mapping from skeleton space to color image pixels.
pub trait CoordinateMapper: Send + Sync {
    fn map_skeleton_point_to_color(
        &self,
        point: SkeletonPoint,
        format: ColorStreamFormat,
    ) -> ColorImagePoint;
}

/// Ideal pinhole projection with the focal length given for a 640x480
/// image, scaled to the requested color resolution.
#[derive(Clone, Copy, Debug)]
pub struct PinholeMapper {
    pub focal_length: f32,
}

impl PinholeMapper {
    const MIN_DEPTH: f32 = 0.1;
    const REFERENCE_WIDTH: f32 = 640.0;

    pub const KINECT_COLOR: PinholeMapper = PinholeMapper {
        focal_length: 531.15,
    };
}

impl CoordinateMapper for PinholeMapper {
    fn map_skeleton_point_to_color(
        &self,
        point: SkeletonPoint,
        format: ColorStreamFormat,
    ) -> ColorImagePoint {
        let width = format.resolution.width as f32;
        let height = format.resolution.height as f32;
        let focal = self.focal_length * width / Self::REFERENCE_WIDTH;
        let z = point.z.max(Self::MIN_DEPTH);

        ColorImagePoint {
            x: (width / 2.0 + focal * point.x / z).round() as i32,
            y: (height / 2.0 - focal * point.y / z).round() as i32,
        }
    }
}
