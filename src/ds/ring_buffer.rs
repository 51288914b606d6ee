use std::ops::Index;

/// A fixed-size ringbuffer
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    buffer: Vec<T>,
    ix: usize,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// Returns `None` if `capacity` is zero
    pub fn new(capacity: usize) -> Option<Self> {
        (capacity > 0).then(|| Self {
            buffer: Vec::with_capacity(capacity),
            ix: 0,
            capacity,
        })
    }

    /// Returns the number of stored elements
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Insert an element into the buffer, overwriting the oldest element once full, and return the write index
    pub fn push(&mut self, item: T) -> usize {
        let ix = self.ix;
        if ix >= self.len() {
            self.buffer.push(item);
        } else {
            self.buffer[ix] = item;
        }
        self.ix = (ix + 1) % self.capacity;
        ix
    }

    /// Get a slice view of the internal buffer
    pub fn view(&self) -> &[T] {
        &self.buffer
    }
}

impl<T> Index<usize> for RingBuffer<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        &self.buffer[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ringbuffer_functional() {
        let mut buf = RingBuffer::new(4).unwrap();
        assert_eq!(buf.len(), 0, "initialized empty");
        assert!(buf.is_empty());

        for i in 0..4 {
            buf.push(i * 2);
        }

        assert_eq!(buf.len(), 4, "length correct");
        assert_eq!(buf.view(), [0, 2, 4, 6], "contents correct");

        buf.push(1);
        let ix = buf.push(3);
        assert_eq!(ix, 1, "write index is correct");
        assert_eq!(buf.len(), 4, "length unchanged");
        assert_eq!(buf.view(), [1, 3, 4, 6], "oldest elements overwritten first");
        assert_eq!(buf[2], 4, "indexing works");
    }

    #[test]
    fn zero_capacity_rejected() {
        assert!(RingBuffer::<u8>::new(0).is_none());
    }
}
