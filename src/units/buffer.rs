//! # Bounded append-only chunk buffer.
//!
//! [`StreamBuffer`] collects chunks in order and rejects pushes once the
//! high-water mark is reached or the buffer is closed. Accepted chunks are
//! never silently dropped; producers observe rejection through `push`'s
//! return value and pause or shed work themselves.

/// Default high-water mark.
pub const DEFAULT_HIGH_WATER: usize = 10_000;

/// Ordered chunk buffer with high-water-mark backpressure.
#[derive(Debug)]
pub struct StreamBuffer<T> {
    chunks: Vec<T>,
    closed: bool,
    high_water: usize,
}

impl<T> StreamBuffer<T> {
    /// Creates a buffer with the default high-water mark.
    pub fn new() -> Self {
        Self::with_high_water(DEFAULT_HIGH_WATER)
    }

    /// Creates a buffer with an explicit high-water mark.
    ///
    /// The mark is clamped to at least 1.
    pub fn with_high_water(high_water: usize) -> Self {
        Self {
            chunks: Vec::new(),
            closed: false,
            high_water: high_water.max(1),
        }
    }

    /// Appends a chunk.
    ///
    /// Returns `false` without inserting when the buffer is closed or the
    /// size already sits at the high-water mark.
    pub fn push(&mut self, chunk: T) -> bool {
        if self.closed || self.chunks.len() >= self.high_water {
            return false;
        }
        self.chunks.push(chunk);
        true
    }

    /// Returns all buffered chunks and clears the buffer.
    pub fn drain(&mut self) -> Vec<T> {
        std::mem::take(&mut self.chunks)
    }

    /// Closes the buffer. Further pushes are rejected. Idempotent.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Number of buffered chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// True when no chunks are buffered.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// True once `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The configured high-water mark.
    pub fn high_water(&self) -> usize {
        self.high_water
    }
}

impl<T: Clone> StreamBuffer<T> {
    /// Returns a copy of the buffered chunks, in insertion order.
    pub fn chunks(&self) -> Vec<T> {
        self.chunks.clone()
    }
}

impl<T> Default for StreamBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}
