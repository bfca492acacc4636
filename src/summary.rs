use std::fmt;
use std::time::Duration;

/// Counters of a finished transfer.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct TransferSummary {
    /// Bytes accepted by the sink.
    pub transferred: u64,

    /// Wall time from the first read to the last accepted write.
    pub elapsed: Duration,

    /// Number of calls to [`NonBlockingSink::try_write`](crate::NonBlockingSink::try_write).
    pub write_calls: u64,

    /// Number of times the transfer waited for the sink to become ready.
    pub suspensions: u64,

    /// Number of readiness waits that hit the readiness timeout.
    pub wait_timeouts: u64,
}

impl TransferSummary {
    /// Average throughput in bytes per second.
    ///
    /// A transfer too short to be measured reports its byte count.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();

        if secs > 0.0 {
            self.transferred as f64 / secs
        } else {
            self.transferred as f64
        }
    }
}

impl fmt::Display for TransferSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} bytes in {:.1} seconds makes {:.1} bytes/sec",
            self.transferred,
            self.elapsed.as_secs_f64(),
            self.throughput()
        )
    }
}
