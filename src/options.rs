use std::num::NonZeroUsize;
use std::time::Duration;

const DEFAULT_BUFFER_CAPACITY: NonZeroUsize = match NonZeroUsize::new(1024 * 1000) {
    Some(capacity) => capacity,
    None => panic!("buffer capacity must not be 0"),
};

const DEFAULT_READINESS_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_ZERO_WRITE_BUDGET: u32 = 64;

/// Options when running [`SlidingUpload`](crate::SlidingUpload).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct UploadOptions {
    buffer_capacity: Option<NonZeroUsize>,
    readiness_timeout: Option<Duration>,
    deadline: Option<Duration>,
    zero_write_budget: Option<u32>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadOptions {
    /// Create a new [`UploadOptions`].
    pub const fn new() -> Self {
        Self {
            buffer_capacity: None,
            readiness_timeout: None,
            deadline: None,
            zero_write_budget: None,
        }
    }

    /// Set `buffer_capacity`, default value is 1,024,000 bytes.
    ///
    /// This is the most bytes offered to the sink in one write.
    #[must_use]
    pub const fn buffer_capacity(mut self, buffer_capacity: NonZeroUsize) -> Self {
        self.buffer_capacity = Some(buffer_capacity);
        self
    }

    pub(super) const fn get_buffer_capacity(&self) -> NonZeroUsize {
        match self.buffer_capacity {
            Some(val) => val,
            None => DEFAULT_BUFFER_CAPACITY,
        }
    }

    /// Set `readiness_timeout`, default value is 10 seconds.
    ///
    /// Upper bound of a single wait for the sink to become ready.
    /// Once it elapses, the pending write is simply retried.
    #[must_use]
    pub const fn readiness_timeout(mut self, readiness_timeout: Duration) -> Self {
        self.readiness_timeout = Some(readiness_timeout);
        self
    }

    pub(super) const fn get_readiness_timeout(&self) -> Duration {
        match self.readiness_timeout {
            Some(val) => val,
            None => DEFAULT_READINESS_TIMEOUT,
        }
    }

    /// Set `deadline`, by default there is none.
    ///
    /// The whole transfer, measured from its start, fails with
    /// [`Error::DeadlineExceeded`](crate::Error::DeadlineExceeded)
    /// if it takes longer than that.
    #[must_use]
    pub const fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub(super) const fn get_deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Set `zero_write_budget`, default value is 64.
    ///
    /// Number of consecutive writes the sink may complete without taking
    /// any byte and without reporting would-block, before the transfer
    /// fails with [`Error::SinkStalled`](crate::Error::SinkStalled).
    #[must_use]
    pub const fn zero_write_budget(mut self, zero_write_budget: u32) -> Self {
        self.zero_write_budget = Some(zero_write_budget);
        self
    }

    pub(super) const fn get_zero_write_budget(&self) -> u32 {
        match self.zero_write_budget {
            Some(val) => val,
            None => DEFAULT_ZERO_WRITE_BUDGET,
        }
    }
}
