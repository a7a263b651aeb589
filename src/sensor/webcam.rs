//! Color-only sensor backed by any camera `nokhwa` can open.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};

use anyhow::{Result, anyhow};
use nokhwa::{
    Buffer, Camera,
    pixel_format::RgbFormat,
    query,
    utils::{ApiBackend, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType},
};

use super::{
    CoordinateMapper, PinholeMapper, Sensor, SensorError, SensorEvents, SensorProvider,
    events::FrameReady, pool::BufferPool, stream::StreamWorker,
};
use crate::types::{
    ColorImageFormat, ColorImageFrame, ColorStreamFormat, DepthRange, DepthStreamFormat,
    StreamKind,
};

const POOL_CAPACITY: usize = 4;

// Prefer pixel formats that are widely supported on macOS (the built-in cameras
// often reject YUYV even though Nokhwa reports it).
const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
    FrameFormat::RAWRGB,
    FrameFormat::RAWBGR,
    FrameFormat::GRAY,
    FrameFormat::YUYV,
    FrameFormat::NV12,
    FrameFormat::MJPEG,
];

fn requested_formats() -> [RequestedFormat<'static>; 4] {
    [
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestFrameRate,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestResolution,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ]
}

#[derive(Clone, Copy, Debug, Default)]
pub struct WebcamProvider;

impl SensorProvider for WebcamProvider {
    fn sensors(&self) -> Result<Vec<Box<dyn Sensor>>, SensorError> {
        let cameras = query(ApiBackend::Auto).map_err(|err| SensorError::Device(err.into()))?;
        Ok(cameras
            .into_iter()
            .map(|info| {
                Box::new(WebcamSensor::new(info.index().clone(), info.human_name()))
                    as Box<dyn Sensor>
            })
            .collect())
    }
}

pub struct WebcamSensor {
    index: CameraIndex,
    label: String,
    color: Option<ColorStreamFormat>,
    events: Arc<SensorEvents>,
    worker: Option<StreamWorker>,
}

impl WebcamSensor {
    pub fn new(index: CameraIndex, label: String) -> Self {
        Self {
            index,
            label,
            color: None,
            events: Arc::new(SensorEvents::new()),
            worker: None,
        }
    }

    fn unsupported(&self, stream: StreamKind) -> SensorError {
        SensorError::StreamUnsupported {
            sensor: self.label.clone(),
            stream,
        }
    }
}

impl Sensor for WebcamSensor {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn enable_color_stream(&mut self, format: ColorStreamFormat) -> Result<(), SensorError> {
        if self.is_running() {
            return Err(SensorError::AlreadyRunning);
        }
        // The camera picks its own pixel format; the request only records
        // the geometry used for coordinate mapping.
        self.color = Some(format);
        Ok(())
    }

    fn enable_depth_stream(&mut self, _format: DepthStreamFormat) -> Result<(), SensorError> {
        Err(self.unsupported(StreamKind::Depth))
    }

    fn enable_skeleton_stream(&mut self) -> Result<(), SensorError> {
        Err(self.unsupported(StreamKind::Skeleton))
    }

    fn color_format(&self) -> Option<ColorStreamFormat> {
        self.color
    }

    fn depth_range(&self) -> DepthRange {
        DepthRange::default()
    }

    fn events(&self) -> &SensorEvents {
        &self.events
    }

    fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    fn start(&mut self) -> Result<(), SensorError> {
        if self.is_running() {
            return Err(SensorError::AlreadyRunning);
        }
        if self.color.is_none() {
            return Ok(());
        }

        // Fail fast before spawning the capture thread.
        build_camera(self.index.clone())?;

        let index = self.index.clone();
        let events = self.events.clone();
        self.worker = Some(StreamWorker::spawn("color", move |stop| {
            run_capture(index, &events, stop)
        })?);
        log::info!("{} started", self.label);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop();
        }
    }

    fn coordinate_mapper(&self) -> Arc<dyn CoordinateMapper> {
        Arc::new(PinholeMapper::KINECT_COLOR)
    }
}

impl Drop for WebcamSensor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn build_camera(index: CameraIndex) -> Result<Camera> {
    let mut last_err = None;

    for requested in requested_formats() {
        match Camera::new(index.clone(), requested) {
            Ok(mut camera) => match camera.open_stream() {
                Ok(()) => return Ok(camera),
                Err(err) => last_err = Some(err.into()),
            },
            Err(err) => last_err = Some(err.into()),
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("failed to open camera with any supported format")))
}

fn run_capture(index: CameraIndex, events: &SensorEvents, stop: &AtomicBool) {
    let mut camera = match build_camera(index) {
        Ok(cam) => cam,
        Err(err) => {
            log::error!("failed to open camera: {err:?}");
            return;
        }
    };

    let pool = Arc::new(BufferPool::<u8>::new(POOL_CAPACITY));
    let release_pool = pool.clone();
    let release: Arc<dyn Fn(ColorImageFrame) + Send + Sync> =
        Arc::new(move |frame: ColorImageFrame| release_pool.release(frame.pixels));

    let mut frame_number = 0u64;
    while !stop.load(Ordering::Relaxed) {
        let frame_start = Instant::now();
        let buffer = match camera.frame() {
            Ok(buffer) => buffer,
            Err(err) => {
                log::warn!(
                    "camera frame read failed (after {:?}): {err:?}",
                    frame_start.elapsed()
                );
                continue;
            }
        };

        let frame = match color_frame_from_buffer(&buffer, &pool, frame_number) {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!("failed to decode camera frame {err:?}");
                continue;
            }
        };

        events
            .color_frame_ready
            .emit(&FrameReady::new(frame, release.clone()));
        frame_number += 1;
    }

    if let Err(err) = camera.stop_stream() {
        log::warn!("failed to stop camera stream: {err:?}");
    }
}

fn color_frame_from_buffer(
    buffer: &Buffer,
    pool: &BufferPool<u8>,
    frame_number: u64,
) -> Result<ColorImageFrame> {
    let resolution = buffer.resolution();
    let (width, height) = (resolution.width_x, resolution.height_y);

    let (format, data) = match buffer.source_frame_format() {
        FrameFormat::NV12 => (ColorImageFormat::Nv12, None),
        FrameFormat::YUYV => (ColorImageFormat::Yuyv, None),
        FrameFormat::RAWRGB => (ColorImageFormat::Rgb24, None),
        FrameFormat::RAWBGR => (ColorImageFormat::Bgr24, None),
        FrameFormat::GRAY => (ColorImageFormat::Gray8, None),
        // Compressed frames have no fixed length; decode them up front.
        FrameFormat::MJPEG => {
            let decoded = buffer.decode_image::<RgbFormat>()?;
            (ColorImageFormat::Rgb24, Some(decoded.into_raw()))
        }
    };

    let source = data.as_deref().unwrap_or_else(|| buffer.buffer());
    let mut pixels = pool.acquire(source.len());
    pixels.copy_from_slice(source);

    Ok(ColorImageFrame {
        pixels,
        width,
        height,
        format,
        frame_number,
        timestamp: Instant::now(),
    })
}
