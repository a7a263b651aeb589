use clap::{Parser, ValueEnum};

use crate::{
    pipeline::{SkeletonOptions, skeleton::JOINT_MARKER_RADIUS},
    sensor::{SensorProvider, synthetic::SyntheticProvider},
    session::SessionRequest,
    types::StreamKind,
};

#[derive(Debug, Parser)]
#[command(
    name = "kinect-viewer",
    version,
    about = "Show a depth camera's color, depth or skeleton stream"
)]
pub struct Cli {
    /// Which stream to show.
    #[arg(value_enum)]
    pub sample: Sample,

    /// Where frames come from.
    #[arg(long, value_enum, default_value_t = BackendKind::default())]
    pub backend: BackendKind,

    /// Joint marker radius in pixels.
    #[arg(
        long,
        default_value_t = JOINT_MARKER_RADIUS,
        value_parser = clap::value_parser!(i32).range(1..=64)
    )]
    pub marker_radius: i32,

    /// Draw bones between joints.
    #[arg(long)]
    pub bones: bool,

    /// Override the too-far distance (mm) used by the depth color map.
    #[arg(long)]
    pub depth_too_far: Option<u16>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Sample {
    Color,
    Depth,
    Skeleton,
}

impl Sample {
    pub fn streams(&self) -> &'static [StreamKind] {
        match self {
            Sample::Color => &[StreamKind::Color],
            Sample::Depth => &[StreamKind::Depth],
            Sample::Skeleton => &[StreamKind::Color, StreamKind::Skeleton],
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Sample::Color => "Color Camera",
            Sample::Depth => "Depth Camera",
            Sample::Skeleton => "Skeleton Tracking",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// Generated frames, no hardware needed.
    Synthetic,
    /// A camera opened through nokhwa (color stream only).
    Webcam,
}

impl Default for BackendKind {
    #[cfg(feature = "camera-nokhwa")]
    fn default() -> Self {
        BackendKind::Webcam
    }

    #[cfg(not(feature = "camera-nokhwa"))]
    fn default() -> Self {
        BackendKind::Synthetic
    }
}

impl BackendKind {
    pub fn provider(&self) -> Box<dyn SensorProvider> {
        match self {
            BackendKind::Synthetic => Box::new(SyntheticProvider::default()),
            #[cfg(feature = "camera-nokhwa")]
            BackendKind::Webcam => Box::new(crate::sensor::webcam::WebcamProvider),
            #[cfg(not(feature = "camera-nokhwa"))]
            BackendKind::Webcam => Box::new(MissingBackend("webcam")),
        }
    }
}

/// Stands in for a backend compiled out of this build.
#[cfg(not(feature = "camera-nokhwa"))]
struct MissingBackend(&'static str);

#[cfg(not(feature = "camera-nokhwa"))]
impl SensorProvider for MissingBackend {
    fn sensors(&self) -> Result<Vec<Box<dyn crate::sensor::Sensor>>, crate::sensor::SensorError> {
        Err(crate::sensor::SensorError::Device(anyhow::anyhow!(
            "the {} backend is not enabled in this build",
            self.0
        )))
    }
}

impl Cli {
    pub fn session_request(&self) -> SessionRequest {
        let mut request = SessionRequest::new(self.sample.streams());
        request.depth_too_far = self.depth_too_far;
        request.skeleton = SkeletonOptions {
            marker_radius: self.marker_radius,
            draw_bones: self.bones,
        };
        request
    }
}
