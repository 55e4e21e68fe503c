//! Element-limited chunk buffer.

/// Minimal allocation made by an empty buffer on its first push.
const MIN_GROWTH: usize = 8;

/// Buffer limited by elements count.
///
/// The buffer is reused across chunks: once its content has been flushed it is [`released`](ChunkBuffer::release)
/// rather than merely cleared, so its allocation never outlives a single chunk. Growth is capped at the limit, so
/// the capacity never exceeds `limit` elements either.
pub struct ChunkBuffer<T> {
    limit: usize,
    inner: Vec<T>,
}

impl<T> ChunkBuffer<T> {
    /// Creates an empty buffer holding up to `limit` elements. Nothing is allocated until the first push.
    pub fn new(limit: usize) -> Self {
        ChunkBuffer {
            limit,
            inner: Vec::new(),
        }
    }

    /// Adds a new element to the buffer.
    pub fn push(&mut self, item: T) {
        if self.inner.len() == self.inner.capacity() {
            let target = (self.inner.capacity() * 2).max(MIN_GROWTH).min(self.limit.max(1));
            self.inner.reserve_exact(target.saturating_sub(self.inner.len()).max(1));
        }
        self.inner.push(item);
    }

    /// Returns buffer length.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Checks if the buffer reached the limit.
    pub fn is_full(&self) -> bool {
        self.inner.len() >= self.limit
    }

    /// Returns the number of elements the buffer can hold without reallocating.
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn as_slice(&self) -> &[T] {
        self.inner.as_slice()
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        self.inner.as_mut_slice()
    }

    /// Drops the content and returns the allocation to the allocator.
    pub fn release(&mut self) {
        self.inner = Vec::new();
    }
}

#[cfg(test)]
mod test {
    use rstest::*;

    use super::ChunkBuffer;

    #[test]
    fn test_limited_buffer() {
        let mut buffer = ChunkBuffer::new(2);

        buffer.push(0);
        assert_eq!(buffer.is_full(), false);
        buffer.push(1);
        assert_eq!(buffer.is_full(), true);

        assert_eq!(buffer.as_slice(), &[0, 1]);
    }

    #[rstest]
    #[case(1)]
    #[case(3)]
    #[case(8)]
    #[case(1000)]
    fn test_capacity_never_exceeds_limit(#[case] limit: usize) {
        let mut buffer = ChunkBuffer::new(limit);
        assert_eq!(buffer.capacity(), 0);

        for item in 0..limit as i64 {
            buffer.push(item);
            assert!(buffer.capacity() <= limit, "capacity {} > limit {}", buffer.capacity(), limit);
        }
        assert!(buffer.is_full());
    }

    #[test]
    fn test_release_returns_capacity_to_zero() {
        let mut buffer = ChunkBuffer::new(100);

        for round in 0..3 {
            for item in 0..100 {
                buffer.push(round * 100 + item);
            }
            assert!(buffer.capacity() >= 100);

            buffer.release();
            assert_eq!(buffer.len(), 0);
            assert_eq!(buffer.capacity(), 0);
        }
    }
}
