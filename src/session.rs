use std::sync::Arc;

use thiserror::Error;

use crate::{
    pipeline::{DisplaySurface, FrameRenderer, SkeletonOptions},
    sensor::{Sensor, SensorError, SensorProvider, Subscription},
    types::{ColorStreamFormat, DepthStreamFormat, StreamKind},
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no sensor found, connect a depth camera and try again")]
    NoSensor,
    #[error(transparent)]
    Sensor(#[from] SensorError),
    #[error("sensor session is already running")]
    AlreadyRunning,
    #[error("sensor session has been stopped")]
    Stopped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Running,
    Stopped,
}

/// What a session should enable and how frames are rendered.
#[derive(Clone, Debug)]
pub struct SessionRequest {
    pub streams: Vec<StreamKind>,
    pub color_format: ColorStreamFormat,
    pub depth_format: DepthStreamFormat,
    /// Replaces the sensor's too-far sentinel when set.
    pub depth_too_far: Option<u16>,
    pub skeleton: SkeletonOptions,
}

impl SessionRequest {
    pub fn new(streams: &[StreamKind]) -> Self {
        Self {
            streams: streams.to_vec(),
            color_format: ColorStreamFormat::RGB_640X480_FPS30,
            depth_format: DepthStreamFormat::RESOLUTION_640X480_FPS30,
            depth_too_far: None,
            skeleton: SkeletonOptions::default(),
        }
    }
}

/// Owns one sensor from start to shutdown.
///
/// `Uninitialized -> Running -> Stopped`; a stopped session cannot be
/// started again. Dropping the session stops it.
pub struct SensorSession {
    state: SessionState,
    sensor: Option<Box<dyn Sensor>>,
    subscriptions: Vec<Subscription>,
}

impl SensorSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Uninitialized,
            sensor: None,
            subscriptions: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn sensor(&self) -> Option<&dyn Sensor> {
        self.sensor.as_deref()
    }

    /// Opens the first sensor `provider` reports, enables the requested
    /// streams and starts delivering frames to `surface`. On failure the
    /// sensor is released and the session stays uninitialized.
    pub fn start(
        &mut self,
        provider: &dyn SensorProvider,
        request: &SessionRequest,
        surface: Arc<dyn DisplaySurface>,
    ) -> Result<(), SessionError> {
        match self.state {
            SessionState::Running => return Err(SessionError::AlreadyRunning),
            SessionState::Stopped => return Err(SessionError::Stopped),
            SessionState::Uninitialized => {}
        }

        let mut sensor = provider
            .sensors()?
            .into_iter()
            .next()
            .ok_or(SessionError::NoSensor)?;
        log::info!("using sensor {}", sensor.label());

        let subscriptions = wire_streams(sensor.as_mut(), request, surface)?;
        sensor.start()?;

        log::info!(
            "sensor session running with {} stream(s)",
            request.streams.len()
        );
        self.sensor = Some(sensor);
        self.subscriptions = subscriptions;
        self.state = SessionState::Running;
        Ok(())
    }

    /// Unregisters the frame listeners, halts delivery and releases the
    /// sensor. Safe to call any number of times.
    pub fn stop(&mut self) {
        if self.state == SessionState::Stopped {
            return;
        }

        self.subscriptions.clear();
        if let Some(mut sensor) = self.sensor.take() {
            if sensor.is_running() {
                sensor.stop();
            }
            log::debug!(
                "{} frame listener(s) left on {}",
                sensor.events().listener_count(),
                sensor.label()
            );
            log::info!("released sensor {}", sensor.label());
        }
        self.state = SessionState::Stopped;
    }
}

impl Default for SensorSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SensorSession {
    fn drop(&mut self) {
        self.stop();
    }
}

fn wire_streams(
    sensor: &mut dyn Sensor,
    request: &SessionRequest,
    surface: Arc<dyn DisplaySurface>,
) -> Result<Vec<Subscription>, SensorError> {
    for stream in &request.streams {
        match stream {
            StreamKind::Color => sensor.enable_color_stream(request.color_format)?,
            StreamKind::Depth => sensor.enable_depth_stream(request.depth_format)?,
            StreamKind::Skeleton => sensor.enable_skeleton_stream()?,
        }
    }

    let mut depth_range = sensor.depth_range();
    if let Some(too_far) = request.depth_too_far {
        depth_range.too_far = too_far;
    }

    let renderer = Arc::new(FrameRenderer::new(
        surface,
        depth_range,
        sensor.color_format().unwrap_or(request.color_format),
        sensor.coordinate_mapper(),
        request.skeleton,
    ));

    let events = sensor.events();
    let subscriptions = request
        .streams
        .iter()
        .map(|stream| {
            let renderer = renderer.clone();
            match stream {
                StreamKind::Color => events
                    .color_frame_ready
                    .subscribe(move |ready| renderer.on_color_frame(ready)),
                StreamKind::Depth => events
                    .depth_frame_ready
                    .subscribe(move |ready| renderer.on_depth_frame(ready)),
                StreamKind::Skeleton => events
                    .skeleton_frame_ready
                    .subscribe(move |ready| renderer.on_skeleton_frame(ready)),
            }
        })
        .collect();

    Ok(subscriptions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        pipeline::channel_surface,
        sensor::{CoordinateMapper, FrameReady, PinholeMapper, SensorEvents},
        types::{ColorImageFormat, ColorImageFrame, DepthRange},
    };
    use std::{
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
        time::Instant,
    };

    #[derive(Default)]
    struct Probe {
        starts: AtomicUsize,
        stops: AtomicUsize,
        releases: AtomicUsize,
        enabled: Mutex<Vec<StreamKind>>,
    }

    struct MockSensor {
        probe: Arc<Probe>,
        events: Arc<SensorEvents>,
        running: bool,
        unsupported: Option<StreamKind>,
    }

    impl Sensor for MockSensor {
        fn label(&self) -> String {
            "mock".into()
        }

        fn enable_color_stream(&mut self, _format: ColorStreamFormat) -> Result<(), SensorError> {
            self.enable(StreamKind::Color)
        }

        fn enable_depth_stream(&mut self, _format: DepthStreamFormat) -> Result<(), SensorError> {
            self.enable(StreamKind::Depth)
        }

        fn enable_skeleton_stream(&mut self) -> Result<(), SensorError> {
            self.enable(StreamKind::Skeleton)
        }

        fn color_format(&self) -> Option<ColorStreamFormat> {
            None
        }

        fn depth_range(&self) -> DepthRange {
            DepthRange::default()
        }

        fn events(&self) -> &SensorEvents {
            &self.events
        }

        fn is_running(&self) -> bool {
            self.running
        }

        fn start(&mut self) -> Result<(), SensorError> {
            self.probe.starts.fetch_add(1, Ordering::SeqCst);
            self.running = true;
            Ok(())
        }

        fn stop(&mut self) {
            if self.running {
                self.probe.stops.fetch_add(1, Ordering::SeqCst);
                self.running = false;
            }
        }

        fn coordinate_mapper(&self) -> Arc<dyn CoordinateMapper> {
            Arc::new(PinholeMapper::KINECT_COLOR)
        }
    }

    impl MockSensor {
        fn enable(&mut self, stream: StreamKind) -> Result<(), SensorError> {
            if self.unsupported == Some(stream) {
                return Err(SensorError::StreamUnsupported {
                    sensor: self.label(),
                    stream,
                });
            }
            self.probe.enabled.lock().unwrap().push(stream);
            Ok(())
        }
    }

    impl Drop for MockSensor {
        fn drop(&mut self) {
            self.probe.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct MockProvider {
        count: usize,
        probe: Arc<Probe>,
        events: Arc<SensorEvents>,
        unsupported: Option<StreamKind>,
    }

    impl MockProvider {
        fn new(count: usize) -> Self {
            Self {
                count,
                probe: Arc::new(Probe::default()),
                events: Arc::new(SensorEvents::new()),
                unsupported: None,
            }
        }
    }

    impl SensorProvider for MockProvider {
        fn sensors(&self) -> Result<Vec<Box<dyn Sensor>>, SensorError> {
            Ok((0..self.count)
                .map(|_| {
                    Box::new(MockSensor {
                        probe: self.probe.clone(),
                        events: self.events.clone(),
                        running: false,
                        unsupported: self.unsupported,
                    }) as Box<dyn Sensor>
                })
                .collect())
        }
    }

    fn start(
        session: &mut SensorSession,
        provider: &MockProvider,
        streams: &[StreamKind],
    ) -> Result<crate::pipeline::DisplayReceiver, SessionError> {
        let (surface, receiver) = channel_surface();
        session.start(provider, &SessionRequest::new(streams), Arc::new(surface))?;
        Ok(receiver)
    }

    #[test]
    fn no_sensor_keeps_session_uninitialized() {
        let mut session = SensorSession::new();
        let provider = MockProvider::new(0);

        let err = start(&mut session, &provider, &[StreamKind::Color]).unwrap_err();

        assert!(matches!(err, SessionError::NoSensor));
        assert_eq!(session.state(), SessionState::Uninitialized);
    }

    #[test]
    fn first_sensor_is_used_and_others_released() {
        let mut session = SensorSession::new();
        let provider = MockProvider::new(3);

        start(&mut session, &provider, &[StreamKind::Color]).expect("start");

        assert_eq!(session.state(), SessionState::Running);
        assert_eq!(provider.probe.starts.load(Ordering::SeqCst), 1);
        assert_eq!(provider.probe.releases.load(Ordering::SeqCst), 2);
        assert!(session.sensor().is_some_and(|sensor| sensor.is_running()));
    }

    #[test]
    fn stream_enable_failure_releases_sensor() {
        let mut session = SensorSession::new();
        let mut provider = MockProvider::new(1);
        provider.unsupported = Some(StreamKind::Skeleton);

        let err = start(
            &mut session,
            &provider,
            &[StreamKind::Color, StreamKind::Skeleton],
        )
        .unwrap_err();

        assert!(matches!(
            err,
            SessionError::Sensor(SensorError::StreamUnsupported { .. })
        ));
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert_eq!(provider.probe.starts.load(Ordering::SeqCst), 0);
        assert_eq!(provider.probe.releases.load(Ordering::SeqCst), 1);
        assert_eq!(provider.events.listener_count(), 0);
    }

    #[test]
    fn running_session_routes_frames_to_surface() {
        let mut session = SensorSession::new();
        let provider = MockProvider::new(1);
        let receiver = start(
            &mut session,
            &provider,
            &[StreamKind::Color, StreamKind::Skeleton],
        )
        .expect("start");

        assert_eq!(
            *provider.probe.enabled.lock().unwrap(),
            vec![StreamKind::Color, StreamKind::Skeleton]
        );
        assert_eq!(provider.events.listener_count(), 2);

        let frame = ColorImageFrame {
            pixels: vec![0; 4],
            width: 1,
            height: 1,
            format: ColorImageFormat::Bgr32,
            frame_number: 0,
            timestamp: Instant::now(),
        };
        provider
            .events
            .color_frame_ready
            .emit(&FrameReady::unpooled(frame));

        assert!(receiver.latest().image.is_some());
    }

    #[test]
    fn stop_is_idempotent_and_releases_once() {
        let mut session = SensorSession::new();
        let provider = MockProvider::new(1);
        start(&mut session, &provider, &[StreamKind::Depth]).expect("start");

        session.stop();
        session.stop();
        drop(session);

        assert_eq!(provider.probe.stops.load(Ordering::SeqCst), 1);
        assert_eq!(provider.probe.releases.load(Ordering::SeqCst), 1);
        assert_eq!(provider.events.listener_count(), 0);
    }

    #[test]
    fn stopped_session_cannot_restart() {
        let mut session = SensorSession::new();
        let provider = MockProvider::new(1);
        start(&mut session, &provider, &[StreamKind::Color]).expect("start");
        session.stop();

        let err = start(&mut session, &provider, &[StreamKind::Color]).unwrap_err();

        assert!(matches!(err, SessionError::Stopped));
        assert_eq!(provider.probe.starts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn running_session_rejects_second_start() {
        let mut session = SensorSession::new();
        let provider = MockProvider::new(1);
        start(&mut session, &provider, &[StreamKind::Color]).expect("start");

        let err = start(&mut session, &provider, &[StreamKind::Color]).unwrap_err();
        assert!(matches!(err, SessionError::AlreadyRunning));
    }

    #[test]
    fn dropping_running_session_stops_sensor() {
        let provider = MockProvider::new(1);
        {
            let mut session = SensorSession::new();
            start(&mut session, &provider, &[StreamKind::Color]).expect("start");
        }
        assert_eq!(provider.probe.stops.load(Ordering::SeqCst), 1);
        assert_eq!(provider.probe.releases.load(Ordering::SeqCst), 1);
    }
}
