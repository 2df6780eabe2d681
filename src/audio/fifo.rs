// Fifo - fixed-capacity lock-free message queue between two threads
//
// Thin wrapper over an rtrb SPSC (Single Producer Single Consumer) ring buffer.
// The engine uses one FIFO per direction so the real-time audio callback never
// blocks or allocates when exchanging messages with the UI thread.
//
// Message flow:
// - CONTROL FIFO: UI thread pushes parameter changes, audio thread drains them
//   at the start of every callback
// - METER FIFO: audio thread pushes level readings, UI thread drains them in
//   update()
//
// All storage is allocated in Fifo::new(); push/pop never allocate.

use rtrb::{Consumer, Producer, PushError, RingBuffer};

/// Lock-free SPSC FIFO constructor
///
/// # Thread Safety
/// - Lock-free: No mutex locks in queue operations
/// - Wait-free: Push/pop operations have bounded execution time
///
/// # Example
/// ```
/// use tone_engine::audio::Fifo;
///
/// let (mut producer, mut consumer) = Fifo::new::<u32>(4);
/// assert!(producer.push(7).is_ok());
/// assert_eq!(consumer.pop(), Some(7));
/// assert_eq!(consumer.pop(), None);
/// ```
pub struct Fifo;

impl Fifo {
    /// Create a FIFO holding up to `capacity` elements.
    ///
    /// # Panics
    /// Panics if capacity is 0
    #[allow(clippy::new_ret_no_self)]
    pub fn new<T>(capacity: usize) -> (FifoProducer<T>, FifoConsumer<T>) {
        assert!(capacity > 0, "capacity must be greater than 0");

        let (producer, consumer) = RingBuffer::new(capacity);
        (
            FifoProducer { inner: producer },
            FifoConsumer { inner: consumer },
        )
    }
}

/// Writing half of a [`Fifo`]. Owned by exactly one thread.
pub struct FifoProducer<T> {
    inner: Producer<T>,
}

impl<T> FifoProducer<T> {
    /// Push an element, handing it back when the FIFO is full.
    #[inline]
    pub fn push(&mut self, value: T) -> Result<(), T> {
        self.inner.push(value).map_err(|err| match err {
            PushError::Full(value) => value,
        })
    }

    /// Number of elements currently queued.
    pub fn len(&self) -> usize {
        self.capacity() - self.inner.slots()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.inner.is_full()
    }

    pub fn capacity(&self) -> usize {
        self.inner.buffer().capacity()
    }

    /// True once the consumer half has been dropped.
    pub fn is_abandoned(&self) -> bool {
        self.inner.is_abandoned()
    }
}

/// Reading half of a [`Fifo`]. Owned by exactly one thread.
pub struct FifoConsumer<T> {
    inner: Consumer<T>,
}

impl<T> FifoConsumer<T> {
    /// Pop the oldest element, if any.
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        self.inner.pop().ok()
    }

    /// Pop every element currently queued, oldest first.
    ///
    /// Elements pushed while draining may or may not be included.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        std::iter::from_fn(move || self.pop())
    }

    /// Number of elements currently queued.
    pub fn len(&self) -> usize {
        self.inner.slots()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.inner.buffer().capacity()
    }

    /// True once the producer half has been dropped.
    pub fn is_abandoned(&self) -> bool {
        self.inner.is_abandoned()
    }
}
