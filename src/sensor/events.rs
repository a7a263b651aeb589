use std::{
    ops::{Deref, DerefMut},
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc, Mutex, Weak,
        atomic::{AtomicU64, Ordering},
    },
};

use crate::types::{ColorImageFrame, DepthImageFrame, SkeletonFrame};

pub type ColorFrameReady = FrameReady<ColorImageFrame>;
pub type DepthFrameReady = FrameReady<DepthImageFrame>;
pub type SkeletonFrameReady = FrameReady<SkeletonFrame>;

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;
type ListenerList<E> = Mutex<Vec<(u64, Listener<E>)>>;
type ReleaseFn<F> = Arc<dyn Fn(F) + Send + Sync>;

/// Per-stream frame notifications raised by a sensor.
pub struct SensorEvents {
    pub color_frame_ready: FrameEvent<ColorFrameReady>,
    pub depth_frame_ready: FrameEvent<DepthFrameReady>,
    pub skeleton_frame_ready: FrameEvent<SkeletonFrameReady>,
}

impl SensorEvents {
    pub fn new() -> Self {
        Self {
            color_frame_ready: FrameEvent::new("color"),
            depth_frame_ready: FrameEvent::new("depth"),
            skeleton_frame_ready: FrameEvent::new("skeleton"),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.color_frame_ready.listener_count()
            + self.depth_frame_ready.listener_count()
            + self.skeleton_frame_ready.listener_count()
    }
}

impl Default for SensorEvents {
    fn default() -> Self {
        Self::new()
    }
}

/// A list of listeners for one stream. Listeners run synchronously on the
/// thread that calls [`FrameEvent::emit`], in subscription order.
pub struct FrameEvent<E> {
    name: &'static str,
    listeners: Arc<ListenerList<E>>,
    next_id: AtomicU64,
}

impl<E: 'static> FrameEvent<E> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self, listener: impl Fn(&E) + Send + Sync + 'static) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.listeners).push((id, Arc::new(listener)));

        let listeners: Weak<ListenerList<E>> = Arc::downgrade(&self.listeners);
        Subscription {
            remove: Some(Box::new(move || {
                if let Some(listeners) = listeners.upgrade() {
                    lock(&listeners).retain(|(entry, _)| *entry != id);
                }
            })),
        }
    }

    /// Delivers `event` to every listener. A panicking listener only loses
    /// this event; the remaining listeners still run.
    pub fn emit(&self, event: &E) {
        // Snapshot so listeners may unsubscribe while being called.
        let listeners: Vec<Listener<E>> = lock(&self.listeners)
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in listeners {
            if panic::catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                log::error!("{} frame listener panicked; frame dropped", self.name);
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handle returned by [`FrameEvent::subscribe`]. Dropping it removes the
/// listener as well.
#[must_use = "dropping a subscription unregisters its listener"]
pub struct Subscription {
    remove: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        self.remove_listener();
    }

    fn remove_listener(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove_listener();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.remove.is_some())
            .finish()
    }
}

/// Payload of a frame-ready notification. The frame can be opened once;
/// whatever happens afterwards it goes back through the release hook.
pub struct FrameReady<F> {
    frame: Mutex<Option<F>>,
    release: ReleaseFn<F>,
}

impl<F> FrameReady<F> {
    pub fn new(frame: F, release: ReleaseFn<F>) -> Self {
        Self {
            frame: Mutex::new(Some(frame)),
            release,
        }
    }

    /// Frame without a release hook, for streams that do not pool buffers.
    pub fn unpooled(frame: F) -> Self
    where
        F: 'static,
    {
        Self::new(frame, Arc::new(|frame: F| drop(frame)))
    }

    /// Returns `None` once the frame has been opened by another listener.
    pub fn open(&self) -> Option<OpenFrame<'_, F>> {
        let frame = lock(&self.frame).take()?;
        Some(OpenFrame {
            frame: Some(frame),
            release: self.release.as_ref(),
        })
    }
}

impl<F> Drop for FrameReady<F> {
    fn drop(&mut self) {
        let frame = self
            .frame
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(frame) = frame {
            (self.release)(frame);
        }
    }
}

/// Scoped access to an opened frame.
pub struct OpenFrame<'a, F> {
    frame: Option<F>,
    release: &'a (dyn Fn(F) + Send + Sync),
}

impl<F> Deref for OpenFrame<'_, F> {
    type Target = F;

    fn deref(&self) -> &F {
        self.frame.as_ref().expect("open frame accessed after release")
    }
}

impl<F> DerefMut for OpenFrame<'_, F> {
    fn deref_mut(&mut self) -> &mut F {
        self.frame.as_mut().expect("open frame accessed after release")
    }
}

impl<F> Drop for OpenFrame<'_, F> {
    fn drop(&mut self) {
        if let Some(frame) = self.frame.take() {
            (self.release)(frame);
        }
    }
}
