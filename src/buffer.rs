use std::fmt;
use std::num::NonZeroUsize;

/// Fixed capacity buffer holding bytes read from the source but not yet
/// accepted by the sink.
///
/// Unsent bytes always start at offset 0: consuming a prefix shifts the
/// remaining tail to the front, making room for new data at the end.
pub struct TransferBuffer {
    mem: Box<[u8]>,
    used: usize,
}

impl fmt::Debug for TransferBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferBuffer")
            .field("capacity", &self.capacity())
            .field("used", &self.used)
            .finish()
    }
}

impl TransferBuffer {
    /// Allocate a zeroed buffer of `capacity` bytes on the heap.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            mem: vec![0; capacity.get()].into_boxed_slice(),
            used: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.mem.len()
    }

    /// Number of buffered bytes not yet accepted by the sink.
    pub fn used(&self) -> usize {
        self.used
    }

    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    pub fn is_full(&self) -> bool {
        self.used == self.mem.len()
    }

    /// Bytes waiting to be sent, in source order.
    pub fn unsent(&self) -> &[u8] {
        &self.mem[..self.used]
    }

    /// Free space at the end of the buffer, to be filled by the source.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.mem[self.used..]
    }

    /// Mark `n` bytes of [`TransferBuffer::spare_mut`] as filled.
    ///
    /// # Panic
    ///
    /// If `n` is larger than the spare capacity.
    pub fn commit(&mut self, n: usize) {
        assert!(
            n <= self.mem.len() - self.used,
            "commit of {n} bytes overflows spare capacity {}",
            self.mem.len() - self.used
        );
        self.used += n;
    }

    /// Drop the first `n` unsent bytes and slide the rest to the front.
    ///
    /// # Panic
    ///
    /// If `n` is larger than [`TransferBuffer::used`].
    pub fn consume(&mut self, n: usize) {
        assert!(
            n <= self.used,
            "consume of {n} bytes exceeds {} buffered",
            self.used
        );

        if n < self.used {
            self.mem.copy_within(n..self.used, 0);
        }
        self.used -= n;
    }

    /// Forget every buffered byte, keeping the allocation.
    pub fn clear(&mut self) {
        self.used = 0;
    }
}
