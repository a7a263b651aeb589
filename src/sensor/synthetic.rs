//! Generated sensor for running the viewers without hardware.
//!
//! Color frames are a drifting gradient, depth frames a ramp with every
//! sentinel band and a moving player silhouette, and the skeleton stream a
//! single waving body among untracked slots.

use std::{
    f32::consts::TAU,
    sync::{Arc, atomic::AtomicBool},
    time::Instant,
};

use super::{
    CoordinateMapper, PinholeMapper, Sensor, SensorError, SensorEvents, SensorProvider,
    events::FrameReady,
    pool::BufferPool,
    stream::{FramePacer, StreamWorker},
};
use crate::types::{
    ColorImageFormat, ColorImageFrame, ColorStreamFormat, DepthImageFrame, DepthRange,
    DepthStreamFormat, Joint, JointTrackingState, JointType, PLAYER_INDEX_BITMASK_WIDTH,
    SKELETON_COUNT, Skeleton, SkeletonFrame, SkeletonPoint, SkeletonTrackingState, StreamKind,
};

const POOL_CAPACITY: usize = 4;
const SKELETON_FPS: u32 = 30;
const BODY_DEPTH: f32 = 2.5;
const PLAYER_DISTANCE: u16 = 1500;
const WALL_NEAR: u16 = 800;

/// Reports a fixed number of synthetic sensors.
#[derive(Clone, Copy, Debug)]
pub struct SyntheticProvider {
    pub devices: usize,
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self { devices: 1 }
    }
}

impl SensorProvider for SyntheticProvider {
    fn sensors(&self) -> Result<Vec<Box<dyn Sensor>>, SensorError> {
        Ok((0..self.devices)
            .map(|index| Box::new(SyntheticSensor::new(index)) as Box<dyn Sensor>)
            .collect())
    }
}

pub struct SyntheticSensor {
    index: usize,
    color: Option<ColorStreamFormat>,
    depth: Option<DepthStreamFormat>,
    skeleton: bool,
    depth_range: DepthRange,
    events: Arc<SensorEvents>,
    workers: Vec<StreamWorker>,
}

impl SyntheticSensor {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            color: None,
            depth: None,
            skeleton: false,
            depth_range: DepthRange::default(),
            events: Arc::new(SensorEvents::new()),
            workers: Vec::new(),
        }
    }

    fn ensure_stopped(&self) -> Result<(), SensorError> {
        if self.is_running() {
            return Err(SensorError::AlreadyRunning);
        }
        Ok(())
    }

    fn spawn_workers(&mut self) -> Result<(), SensorError> {
        if let Some(format) = self.color {
            let events = self.events.clone();
            self.workers.push(StreamWorker::spawn("color", move |stop| {
                run_color_stream(format, &events, stop)
            })?);
        }

        if let Some(format) = self.depth {
            let events = self.events.clone();
            let range = self.depth_range;
            self.workers.push(StreamWorker::spawn("depth", move |stop| {
                run_depth_stream(format, range, &events, stop)
            })?);
        }

        if self.skeleton {
            let events = self.events.clone();
            self.workers.push(StreamWorker::spawn("skeleton", move |stop| {
                run_skeleton_stream(&events, stop)
            })?);
        }

        Ok(())
    }
}

impl Sensor for SyntheticSensor {
    fn label(&self) -> String {
        format!("Synthetic sensor #{}", self.index)
    }

    fn enable_color_stream(&mut self, format: ColorStreamFormat) -> Result<(), SensorError> {
        self.ensure_stopped()?;
        if format.pixel_format != ColorImageFormat::Bgr32 {
            return Err(SensorError::InvalidFormat {
                stream: StreamKind::Color,
                detail: format!("{:?} (only Bgr32 is generated)", format.pixel_format),
            });
        }
        validate_resolution(StreamKind::Color, format.resolution.width, format.resolution.height)?;
        self.color = Some(format);
        Ok(())
    }

    fn enable_depth_stream(&mut self, format: DepthStreamFormat) -> Result<(), SensorError> {
        self.ensure_stopped()?;
        validate_resolution(StreamKind::Depth, format.resolution.width, format.resolution.height)?;
        self.depth = Some(format);
        Ok(())
    }

    fn enable_skeleton_stream(&mut self) -> Result<(), SensorError> {
        self.ensure_stopped()?;
        self.skeleton = true;
        Ok(())
    }

    fn color_format(&self) -> Option<ColorStreamFormat> {
        self.color
    }

    fn depth_range(&self) -> DepthRange {
        self.depth_range
    }

    fn events(&self) -> &SensorEvents {
        &self.events
    }

    fn is_running(&self) -> bool {
        !self.workers.is_empty()
    }

    fn start(&mut self) -> Result<(), SensorError> {
        self.ensure_stopped()?;
        if let Err(err) = self.spawn_workers() {
            self.stop();
            return Err(err);
        }
        log::info!("{} started {} stream(s)", self.label(), self.workers.len());
        Ok(())
    }

    fn stop(&mut self) {
        for worker in self.workers.drain(..) {
            worker.stop();
        }
    }

    fn coordinate_mapper(&self) -> Arc<dyn CoordinateMapper> {
        Arc::new(PinholeMapper::KINECT_COLOR)
    }
}

impl Drop for SyntheticSensor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn validate_resolution(stream: StreamKind, width: u32, height: u32) -> Result<(), SensorError> {
    if width == 0 || height == 0 {
        return Err(SensorError::InvalidFormat {
            stream,
            detail: format!("{width}x{height}"),
        });
    }
    Ok(())
}

fn run_color_stream(format: ColorStreamFormat, events: &SensorEvents, stop: &AtomicBool) {
    let (width, height) = (format.resolution.width, format.resolution.height);
    let pool = Arc::new(BufferPool::<u8>::new(POOL_CAPACITY));
    let release_pool = pool.clone();
    let release: Arc<dyn Fn(ColorImageFrame) + Send + Sync> =
        Arc::new(move |frame: ColorImageFrame| release_pool.release(frame.pixels));

    let mut pacer = FramePacer::new(format.fps);
    let mut frame_number = 0u64;
    while pacer.wait(stop) {
        let mut pixels = pool.acquire(width as usize * height as usize * 4);
        fill_color_gradient(&mut pixels, width, height, frame_number);

        let frame = ColorImageFrame {
            pixels,
            width,
            height,
            format: ColorImageFormat::Bgr32,
            frame_number,
            timestamp: Instant::now(),
        };
        events
            .color_frame_ready
            .emit(&FrameReady::new(frame, release.clone()));
        frame_number += 1;
    }
}

fn run_depth_stream(
    format: DepthStreamFormat,
    range: DepthRange,
    events: &SensorEvents,
    stop: &AtomicBool,
) {
    let (width, height) = (format.resolution.width, format.resolution.height);
    let pool = Arc::new(BufferPool::<u16>::new(POOL_CAPACITY));
    let release_pool = pool.clone();
    let release: Arc<dyn Fn(DepthImageFrame) + Send + Sync> =
        Arc::new(move |frame: DepthImageFrame| release_pool.release(frame.pixels));

    let mut pacer = FramePacer::new(format.fps);
    let mut frame_number = 0u64;
    while pacer.wait(stop) {
        let mut pixels = pool.acquire(width as usize * height as usize);
        fill_depth_scene(&mut pixels, width, height, &range, frame_number);

        let frame = DepthImageFrame {
            pixels,
            width,
            height,
            frame_number,
            timestamp: Instant::now(),
        };
        events
            .depth_frame_ready
            .emit(&FrameReady::new(frame, release.clone()));
        frame_number += 1;
    }
}

fn run_skeleton_stream(events: &SensorEvents, stop: &AtomicBool) {
    let mut pacer = FramePacer::new(SKELETON_FPS);
    let mut frame_number = 0u64;
    while pacer.wait(stop) {
        let frame = SkeletonFrame {
            skeletons: synthetic_skeletons(frame_number),
            frame_number,
            timestamp: Instant::now(),
        };
        events
            .skeleton_frame_ready
            .emit(&FrameReady::unpooled(frame));
        frame_number += 1;
    }
}

/// Fills a BGR32 buffer with a gradient that drifts horizontally.
pub fn fill_color_gradient(pixels: &mut [u8], width: u32, height: u32, frame_number: u64) {
    let shift = (frame_number % u64::from(width.max(1))) as u32;
    for (i, px) in pixels.chunks_exact_mut(4).enumerate() {
        let x = i as u32 % width;
        let y = i as u32 / width;
        px[0] = (((x + shift) % width) * 255 / width.max(1)) as u8;
        px[1] = (y * 255 / height.max(1)) as u8;
        px[2] = 96;
        px[3] = 0;
    }
}

/// Fills raw depth samples: an unknown border, a too-near corner, a far
/// band at the right edge, a ramp in between and a moving player disc.
pub fn fill_depth_scene(
    pixels: &mut [u16],
    width: u32,
    height: u32,
    range: &DepthRange,
    frame_number: u64,
) {
    let border = (width.min(height) / 32).max(1);
    let far_band = width - width / 8;
    let near_corner = (width / 6, height / 6);

    let phase = (frame_number % 120) as f32 / 120.0 * TAU;
    let player_x = width as f32 * (0.5 + 0.25 * phase.sin());
    let player_y = height as f32 * 0.55;
    let player_r = height as f32 * 0.2;

    let ramp_span = range.too_far.saturating_sub(WALL_NEAR).max(1);

    for (i, sample) in pixels.iter_mut().enumerate() {
        let x = i as u32 % width;
        let y = i as u32 / width;

        let (distance, player) = if x < border
            || y < border
            || x >= width - border
            || y >= height - border
        {
            (range.unknown.unwrap_or(0x1FFF), 0)
        } else if x < near_corner.0 && y < near_corner.1 {
            (range.too_near, 0)
        } else if x >= far_band {
            (range.too_far, 0)
        } else {
            let dx = x as f32 - player_x;
            let dy = y as f32 - player_y;
            if dx * dx + dy * dy <= player_r * player_r {
                (PLAYER_DISTANCE, 1)
            } else {
                let ramp = (u64::from(x) * u64::from(ramp_span) / u64::from(far_band)) as u16;
                // Keep the ramp strictly inside the valid band.
                (WALL_NEAR + ramp.min(ramp_span - 1).max(1), 0)
            }
        };

        *sample = (distance << PLAYER_INDEX_BITMASK_WIDTH) | player;
    }
}

/// One tracked, waving body in slot 0; the other slots are empty.
pub fn synthetic_skeletons(frame_number: u64) -> Vec<Skeleton> {
    let t = (frame_number % 90) as f32 / 90.0 * TAU;
    let sway = 0.3 * t.sin();
    let wave = 0.25 * (2.0 * t).sin();

    let mut skeletons = vec![Skeleton::untracked(); SKELETON_COUNT];
    let body = &mut skeletons[0];
    body.tracking_id = 1;
    body.tracking_state = SkeletonTrackingState::Tracked;
    body.position = SkeletonPoint {
        x: sway,
        y: 0.0,
        z: BODY_DEPTH,
    };
    body.joints = JointType::ALL
        .iter()
        .map(|&joint_type| {
            let (x, y) = rest_pose(joint_type);
            let lift = match joint_type {
                JointType::ElbowRight => 0.25 + wave * 0.5,
                JointType::WristRight | JointType::HandRight => 0.55 + wave,
                _ => 0.0,
            };
            let tracking_state = match joint_type {
                JointType::FootLeft | JointType::FootRight => JointTrackingState::Inferred,
                _ => JointTrackingState::Tracked,
            };
            Joint {
                joint_type,
                position: SkeletonPoint {
                    x: x + sway,
                    y: y + lift,
                    z: BODY_DEPTH,
                },
                tracking_state,
            }
        })
        .collect();

    // A second body that is only position-tracked.
    skeletons[1].tracking_state = SkeletonTrackingState::PositionOnly;
    skeletons[1].tracking_id = 2;
    skeletons[1].position = SkeletonPoint {
        x: -1.0,
        y: 0.0,
        z: 3.2,
    };

    skeletons
}

fn rest_pose(joint_type: JointType) -> (f32, f32) {
    match joint_type {
        JointType::HipCenter => (0.0, -0.05),
        JointType::Spine => (0.0, 0.1),
        JointType::ShoulderCenter => (0.0, 0.45),
        JointType::Head => (0.0, 0.65),
        JointType::ShoulderLeft => (-0.18, 0.4),
        JointType::ElbowLeft => (-0.3, 0.15),
        JointType::WristLeft => (-0.35, -0.05),
        JointType::HandLeft => (-0.37, -0.12),
        JointType::ShoulderRight => (0.18, 0.4),
        JointType::ElbowRight => (0.3, 0.15),
        JointType::WristRight => (0.35, -0.05),
        JointType::HandRight => (0.37, -0.12),
        JointType::HipLeft => (-0.1, -0.1),
        JointType::KneeLeft => (-0.12, -0.5),
        JointType::AnkleLeft => (-0.12, -0.9),
        JointType::FootLeft => (-0.14, -0.95),
        JointType::HipRight => (0.1, -0.1),
        JointType::KneeRight => (0.12, -0.5),
        JointType::AnkleRight => (0.12, -0.9),
        JointType::FootRight => (0.14, -0.95),
    }
}
