//! Fixed-capacity history of the most recent values.
//!
//! Storage is a dense array plus a write cursor. Consumers only ever see
//! `snapshot()`, which is rotated into chronological order.

#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    slots: Vec<T>,
    /// Index of the most recent write. Starts at `capacity - 1` so the first
    /// push lands in slot 0.
    cursor: usize,
    pushed: u64,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Create a buffer with `capacity` default-initialised slots (min 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: vec![T::default(); capacity],
            cursor: capacity - 1,
            pushed: 0,
        }
    }

    /// Overwrite the oldest slot. O(1), never fails.
    pub fn push(&mut self, value: T) {
        self.cursor = (self.cursor + 1) % self.slots.len();
        self.slots[self.cursor] = value;
        self.pushed = self.pushed.saturating_add(1);
    }

    /// Most recently pushed value, `None` before the first push.
    pub fn latest(&self) -> Option<T> {
        (self.pushed > 0).then(|| self.slots[self.cursor])
    }

    /// All `capacity` slots, oldest first, most recent last.
    ///
    /// Until the buffer has wrapped once, the leading entries are the
    /// never-written default slots.
    pub fn snapshot(&self) -> Vec<T> {
        let mut out = self.slots.clone();
        out.rotate_left((self.cursor + 1) % self.slots.len());
        out
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots that hold a pushed value.
    pub fn len(&self) -> usize {
        usize::try_from(self.pushed)
            .unwrap_or(usize::MAX)
            .min(self.slots.len())
    }

    pub fn is_empty(&self) -> bool {
        self.pushed == 0
    }

    /// Total pushes over the buffer's lifetime.
    pub fn total_pushed(&self) -> u64 {
        self.pushed
    }
}
