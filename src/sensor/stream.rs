use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use super::SensorError;

/// One background thread delivering frames for a single stream.
#[derive(Debug)]
pub struct StreamWorker {
    name: &'static str,
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl StreamWorker {
    pub fn spawn<F>(name: &'static str, body: F) -> Result<Self, SensorError>
    where
        F: FnOnce(&AtomicBool) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let handle = thread::Builder::new()
            .name(format!("{name}-stream"))
            .spawn(move || body(&stop_flag))
            .map_err(|err| SensorError::Device(err.into()))?;

        Ok(Self {
            name,
            stop,
            handle: Some(handle),
        })
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("{} stream worker panicked", self.name);
            }
        }
    }
}

impl Drop for StreamWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Sleeps a worker loop to a fixed frame rate without drifting.
#[derive(Debug)]
pub struct FramePacer {
    interval: Duration,
    next: Instant,
}

impl FramePacer {
    pub fn new(fps: u32) -> Self {
        let interval = Duration::from_millis(1_000 / u64::from(fps.max(1)));
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Waits for the next frame slot. Returns `false` once `stop` is set.
    pub fn wait(&mut self, stop: &AtomicBool) -> bool {
        const POLL: Duration = Duration::from_millis(5);

        loop {
            if stop.load(Ordering::Relaxed) {
                return false;
            }
            let now = Instant::now();
            if now >= self.next {
                // Skip missed slots instead of bursting to catch up.
                self.next = (self.next + self.interval).max(now);
                return true;
            }
            thread::sleep((self.next - now).min(POLL));
        }
    }
}
