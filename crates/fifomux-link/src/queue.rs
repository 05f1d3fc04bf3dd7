use std::collections::VecDeque;
use std::fmt;

/// Returned when a [`BoundedQueue`] rejects a value, handing it back.
#[derive(Debug, PartialEq, Eq)]
pub struct Full<T>(pub T);

impl<T> fmt::Display for Full<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("bounded queue full")
    }
}

impl<T: fmt::Debug> std::error::Error for Full<T> {}

/// Fixed-capacity single-producer/single-consumer queue.
///
/// Models a hardware FIFO: capacity is decided at construction, overflow is
/// an explicit, observable rejection rather than a reallocation. Everything
/// crossing between the link and core domains goes through one of these.
#[derive(Debug, Clone)]
pub struct BoundedQueue<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be non-zero");
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a value, or hand it back if the queue is full.
    pub fn push(&mut self, value: T) -> Result<(), Full<T>> {
        if self.items.len() == self.capacity {
            return Err(Full(value));
        }
        self.items.push_back(value);
        Ok(())
    }

    /// Remove and return the oldest value.
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Peek at the oldest value without removing it.
    pub fn front(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() == self.capacity
    }

    /// Number of items currently queued.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Maximum number of items the queue can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Discard all queued items.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_fifo_order() {
        let mut q = BoundedQueue::new(4);
        q.push(1).unwrap();
        q.push(2).unwrap();
        q.push(3).unwrap();
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), Some(3));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn rejects_when_full() {
        let mut q = BoundedQueue::new(2);
        q.push(10).unwrap();
        q.push(20).unwrap();
        assert!(q.is_full());
        assert_eq!(q.push(30), Err(Full(30)));
        // Rejection does not disturb queued items.
        assert_eq!(q.pop(), Some(10));
        q.push(30).unwrap();
        assert_eq!(q.pop(), Some(20));
        assert_eq!(q.pop(), Some(30));
    }

    #[test]
    fn len_and_capacity() {
        let mut q = BoundedQueue::new(3);
        assert_eq!(q.capacity(), 3);
        assert!(q.is_empty());
        q.push(1).unwrap();
        q.push(2).unwrap();
        assert_eq!(q.len(), 2);
        q.clear();
        assert!(q.is_empty());
    }

    #[test]
    #[should_panic(expected = "non-zero")]
    fn zero_capacity_panics() {
        let _ = BoundedQueue::<u32>::new(0);
    }
}
