//! Fixed-capacity circular buffer.

use std::num::NonZeroUsize;

use crate::error::{HistoryError, HistoryResult};

/// Fixed-capacity circular buffer with oldest-first eviction.
///
/// Storage is fully initialized at construction, so no slot is ever read
/// before it holds a value of `T`. Once `capacity` values have been written,
/// each new value overwrites the oldest one in place.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    storage: Box<[T]>,
    /// Slot the next write goes to.
    write_index: usize,
    /// Number of valid values (`<= capacity`).
    len: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    pub fn new(capacity: usize) -> HistoryResult<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
            HistoryError::InvalidCapacity("ring buffer capacity must be positive".to_string())
        })?;
        Ok(Self::with_capacity(capacity))
    }

    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            storage: vec![T::default(); capacity.get()].into_boxed_slice(),
            write_index: 0,
            len: 0,
        }
    }

    pub fn push(&mut self, value: T) {
        let capacity = self.storage.len();
        self.storage[self.write_index] = value;
        self.write_index = (self.write_index + 1) % capacity;
        self.len = (self.len + 1).min(capacity);
    }

    pub fn extend_from_slice(&mut self, values: &[T]) {
        for &value in values {
            self.push(value);
        }
    }

    /// Values in chronological order (oldest first). Does not mutate.
    pub fn read_ordered(&self) -> Vec<T> {
        let capacity = self.storage.len();
        let start = (self.write_index + capacity - self.len) % capacity;
        let mut out = Vec::with_capacity(self.len);
        if start + self.len <= capacity {
            out.extend_from_slice(&self.storage[start..start + self.len]);
        } else {
            out.extend_from_slice(&self.storage[start..]);
            out.extend_from_slice(&self.storage[..self.write_index]);
        }
        out
    }

    /// Most recently written value.
    pub fn latest(&self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let capacity = self.storage.len();
        Some(self.storage[(self.write_index + capacity - 1) % capacity])
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    pub fn is_full(&self) -> bool {
        self.len == self.storage.len()
    }
}
