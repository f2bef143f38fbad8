/// Fixed-capacity FIFO buffer.
///
/// Pushing into a full buffer overwrites (and returns) the oldest element.
/// Iteration runs oldest to newest.
#[derive(Clone, Debug)]
pub(crate) struct RingBuffer<T> {
    buffer: Vec<T>,
    head: usize,
    tail: usize,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    #[must_use]
    pub(crate) fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be positive");

        Self {
            buffer: Vec::with_capacity(capacity),
            head: 0,
            tail: 0,
            capacity,
        }
    }

    #[inline]
    pub(crate) fn is_ready(&self) -> bool {
        self.buffer.len() == self.capacity
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Appends `value`, returning the evicted oldest element once full.
    #[must_use = "a full buffer evicts its oldest element"]
    pub(crate) fn push(&mut self, value: T) -> Option<T> {
        if self.is_ready() {
            let old = std::mem::replace(&mut self.buffer[self.head], value);

            self.tail = self.head;
            self.head += 1;
            if self.head == self.capacity {
                self.head = 0;
            }

            Some(old)
        } else {
            self.tail = self.buffer.len();
            self.buffer.push(value);

            None
        }
    }

    /// Overwrites the newest element, returning the previous one.
    pub(crate) fn replace(&mut self, value: T) -> Option<T> {
        if self.is_empty() {
            return None;
        }

        Some(std::mem::replace(&mut self.buffer[self.tail], value))
    }

    #[inline]
    pub(crate) fn last(&self) -> Option<&T> {
        self.buffer.get(self.tail)
    }

    pub(crate) fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + '_ {
        let (newer, older) = self.buffer.split_at(self.head);
        older.iter().chain(newer.iter())
    }

    pub(crate) fn clear(&mut self) {
        self.buffer.clear();
        self.head = 0;
        self.tail = 0;
    }
}

impl<T: Clone> RingBuffer<T> {
    pub(crate) fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}
