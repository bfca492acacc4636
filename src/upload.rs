use super::{
    Error, IncompleteTransfer, NonBlockingSink, TransferBuffer, TransferSummary, UploadOptions,
    WriteOutcome,
};

use std::future::{pending, poll_fn, Future};
use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::yield_now;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

/// Streams a source into a [`NonBlockingSink`] through a sliding
/// [`TransferBuffer`].
///
/// Every iteration tops the buffer up from the source, offers all of its
/// unsent bytes to the sink and drops whatever prefix the sink accepted.
/// Would-block is handled by waiting for the sink to become ready and
/// retrying with the very same bytes.
#[derive(Debug)]
pub struct SlidingUpload {
    buffer: TransferBuffer,
    options: UploadOptions,
    cancel_token: CancellationToken,
}

impl SlidingUpload {
    /// Create a [`SlidingUpload`] with a newly allocated buffer of
    /// `options`' capacity.
    pub fn new(options: UploadOptions) -> Self {
        Self::with_buffer(TransferBuffer::new(options.get_buffer_capacity()), options)
    }

    /// Create a [`SlidingUpload`] that reuses `buffer`.
    ///
    /// The capacity of `buffer` takes precedence over the one in `options`.
    pub fn with_buffer(buffer: TransferBuffer, options: UploadOptions) -> Self {
        Self {
            buffer,
            options,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Replace the token used to cancel the transfer.
    #[must_use]
    pub fn with_cancellation_token(mut self, cancel_token: CancellationToken) -> Self {
        self.cancel_token = cancel_token;
        self
    }

    /// Return the token that cancels [`SlidingUpload::run`] when
    /// cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Give the buffer back, e.g. to reuse it for another transfer.
    pub fn into_buffer(self) -> TransferBuffer {
        self.buffer
    }

    /// Move every byte of `source` into `sink`, in order.
    ///
    /// On failure the error is [`Error::Incomplete`], which carries the
    /// number of bytes already accepted by the sink.
    pub async fn run<R, S>(&mut self, mut source: R, mut sink: S) -> Result<TransferSummary, Error>
    where
        R: AsyncRead + Unpin,
        S: NonBlockingSink,
    {
        self.buffer.clear();

        let started = Instant::now();
        let guard = Guard {
            cancel_token: &self.cancel_token,
            deadline: self
                .options
                .get_deadline()
                .map(|deadline| (started + deadline, deadline)),
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            capacity = self.buffer.capacity(),
            "starting sliding upload"
        );

        let mut summary = TransferSummary::default();

        let res = transfer(
            &mut self.buffer,
            &self.options,
            &guard,
            &mut source,
            &mut sink,
            &mut summary,
        )
        .await;

        summary.elapsed = started.elapsed();

        match res {
            Ok(()) => {
                debug_assert!(self.buffer.is_empty());

                #[cfg(feature = "tracing")]
                tracing::debug!(%summary, "sliding upload done");

                Ok(summary)
            }
            Err(error) => {
                #[cfg(feature = "tracing")]
                tracing::error!(
                    ?error,
                    transferred = summary.transferred,
                    unsent = self.buffer.used(),
                    "sliding upload aborted"
                );

                Err(Error::Incomplete(Box::new(IncompleteTransfer {
                    transferred: summary.transferred,
                    unsent: self.buffer.used(),
                    error,
                })))
            }
        }
    }
}

/// Run a [`SlidingUpload`] created from `options`.
pub async fn upload<R, S>(source: R, sink: S, options: UploadOptions) -> Result<TransferSummary, Error>
where
    R: AsyncRead + Unpin,
    S: NonBlockingSink,
{
    SlidingUpload::new(options).run(source, sink).await
}

async fn transfer<R, S>(
    buffer: &mut TransferBuffer,
    options: &UploadOptions,
    guard: &Guard<'_>,
    source: &mut R,
    sink: &mut S,
    summary: &mut TransferSummary,
) -> Result<(), Error>
where
    R: AsyncRead + Unpin,
    S: NonBlockingSink,
{
    let readiness_timeout = options.get_readiness_timeout();
    let zero_write_budget = options.get_zero_write_budget();

    let mut eof = false;

    loop {
        guard.check()?;

        if !eof && !buffer.is_full() {
            let n = guard.run(read_some(source, buffer.spare_mut())).await?;

            // A read of 0 bytes into a non-empty buffer is end-of-data,
            // from now on the loop only flushes.
            eof = n == 0;
            buffer.commit(n);
        }

        if buffer.is_empty() {
            debug_assert!(eof);
            break Ok(());
        }

        let offered = buffer.used();
        let mut zero_writes = 0;

        let accepted = loop {
            summary.write_calls += 1;

            match sink.try_write(buffer.unsent())? {
                WriteOutcome::WouldBlock => {
                    zero_writes = 0;
                    summary.suspensions += 1;

                    if !wait_ready(sink, readiness_timeout, guard).await? {
                        summary.wait_timeouts += 1;
                    }
                }
                WriteOutcome::Accepted(0) => {
                    zero_writes += 1;
                    if zero_writes > zero_write_budget {
                        return Err(Error::SinkStalled {
                            attempts: zero_writes,
                        });
                    }

                    guard.check()?;
                    yield_now().await;
                }
                WriteOutcome::Accepted(n) if n > offered => {
                    return Err(Error::SinkOverAccepted {
                        accepted: n,
                        offered,
                    })
                }
                WriteOutcome::Accepted(n) => break n,
            }
        };

        buffer.consume(accepted);
        summary.transferred += accepted as u64;
    }
}

/// Read once, retrying transient errors.
async fn read_some<R>(source: &mut R, buf: &mut [u8]) -> Result<usize, Error>
where
    R: AsyncRead + Unpin,
{
    loop {
        match source.read(buf).await {
            Ok(n) => break Ok(n),
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
                ) =>
            {
                yield_now().await
            }
            Err(err) => break Err(err.into()),
        }
    }
}

/// Wait until `sink` is ready for another write.
///
/// Return `false` if `readiness_timeout` elapsed first.
async fn wait_ready<S>(
    sink: &mut S,
    readiness_timeout: Duration,
    guard: &Guard<'_>,
) -> Result<bool, Error>
where
    S: NonBlockingSink,
{
    let directions = sink.block_directions().or_both();
    let ready = time::timeout(
        readiness_timeout,
        poll_fn(|cx| sink.poll_ready(cx, directions)),
    );

    match guard.run(async { Ok(ready.await) }).await? {
        Ok(res) => res.map(|()| true),
        Err(_elapsed) => {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                ?readiness_timeout,
                ?directions,
                "sink is still not ready, retrying write"
            );

            Ok(false)
        }
    }
}

/// Cancellation and deadline shared by every suspension point.
#[derive(Debug)]
struct Guard<'a> {
    cancel_token: &'a CancellationToken,
    /// (instant, configured duration)
    deadline: Option<(Instant, Duration)>,
}

impl Guard<'_> {
    fn check(&self) -> Result<(), Error> {
        if self.cancel_token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        match self.deadline {
            Some((at, deadline)) if Instant::now() >= at => Err(Error::DeadlineExceeded(deadline)),
            _ => Ok(()),
        }
    }

    async fn run<T, F>(&self, fut: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        let deadline = async {
            match self.deadline {
                Some((at, deadline)) => {
                    time::sleep_until(at).await;
                    deadline
                }
                None => pending().await,
            }
        };

        tokio::select! {
            biased;

            _ = self.cancel_token.cancelled() => Err(Error::Cancelled),
            deadline = deadline => Err(Error::DeadlineExceeded(deadline)),
            res = fut => res,
        }
    }
}
