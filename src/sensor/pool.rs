use std::sync::Mutex;

/// Recycles frame buffers between a stream worker and the listeners that
/// release opened frames.
#[derive(Debug)]
pub struct BufferPool<T> {
    free: Mutex<Vec<Vec<T>>>,
    capacity: usize,
}

impl<T: Clone + Default> BufferPool<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    /// Returns a zeroed buffer of exactly `len` elements.
    pub fn acquire(&self, len: usize) -> Vec<T> {
        let recycled = self
            .free
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop();

        match recycled {
            Some(mut buffer) => {
                buffer.clear();
                buffer.resize(len, T::default());
                buffer
            }
            None => vec![T::default(); len],
        }
    }

    pub fn release(&self, buffer: Vec<T>) {
        let mut free = self
            .free
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if free.len() < self.capacity {
            free.push(buffer);
        }
    }

    #[cfg(test)]
    pub fn available(&self) -> usize {
        self.free
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}
