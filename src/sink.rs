use super::Error;

use std::task::{Context, Poll};

/// Result of a successful [`NonBlockingSink::try_write`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum WriteOutcome {
    /// The sink took the first `n` bytes of the buffer offered.
    Accepted(usize),

    /// No progress is possible right now, wait for readiness and then
    /// retry with the same buffer.
    WouldBlock,
}

/// Direction(s) the transport under a sink is blocked on.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum BlockDirections {
    /// Not blocked.
    #[default]
    None,
    /// Waiting for the transport to become readable.
    Inbound,
    /// Waiting for the transport to become writable.
    Outbound,
    /// Waiting for either direction.
    Both,
}

impl BlockDirections {
    pub fn inbound(self) -> bool {
        matches!(self, BlockDirections::Inbound | BlockDirections::Both)
    }

    pub fn outbound(self) -> bool {
        matches!(self, BlockDirections::Outbound | BlockDirections::Both)
    }

    /// Directions to wait for after a would-block.
    ///
    /// A transport that blocked without recording a direction is waited
    /// for in both.
    pub fn or_both(self) -> Self {
        match self {
            BlockDirections::None => BlockDirections::Both,
            directions => directions,
        }
    }
}

/// A write-side channel that can accept data partially and never blocks
/// the caller.
///
/// The upload loop offers the same bytes again after
/// [`WriteOutcome::WouldBlock`], so implementations may rely on it, as
/// libssh2's sftp write does.
pub trait NonBlockingSink {
    /// Offer `buf` to the sink.
    ///
    /// Returning `Err` is fatal: the transfer is aborted.
    fn try_write(&mut self, buf: &[u8]) -> Result<WriteOutcome, Error>;

    /// Which direction to wait for before retrying a write that
    /// returned [`WriteOutcome::WouldBlock`].
    ///
    /// [`BlockDirections::None`] is waited for as [`BlockDirections::Both`].
    fn block_directions(&self) -> BlockDirections;

    /// Poll until the transport is ready in `directions`.
    ///
    /// Spurious readiness is fine, the write is simply retried.
    fn poll_ready(
        &mut self,
        cx: &mut Context<'_>,
        directions: BlockDirections,
    ) -> Poll<Result<(), Error>>;
}

impl<S: NonBlockingSink + ?Sized> NonBlockingSink for &mut S {
    fn try_write(&mut self, buf: &[u8]) -> Result<WriteOutcome, Error> {
        (**self).try_write(buf)
    }

    fn block_directions(&self) -> BlockDirections {
        (**self).block_directions()
    }

    fn poll_ready(
        &mut self,
        cx: &mut Context<'_>,
        directions: BlockDirections,
    ) -> Poll<Result<(), Error>> {
        (**self).poll_ready(cx, directions)
    }
}
