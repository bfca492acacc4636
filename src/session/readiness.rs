use crate::BlockDirections;

use std::io;
use std::mem;
use std::os::unix::io::RawFd;
use std::task::{ready, Context, Poll};

use tokio::io::unix::AsyncFd;

/// Readiness of the socket libssh2 performs its io on.
///
/// libssh2 reads and writes the socket itself, so tokio never observes
/// `EWOULDBLOCK` and cannot clear readiness on its own. The session marks
/// the readiness as stale whenever libssh2 reports `EAGAIN`. The next wait
/// drops readiness that was already set when it started, and only that.
#[derive(Debug)]
pub(super) struct Readiness {
    fd: AsyncFd<RawFd>,
    stale_inbound: bool,
    stale_outbound: bool,
}

impl Readiness {
    /// `fd` must stay open for the lifetime of the returned value.
    pub(super) fn new(fd: RawFd) -> io::Result<Self> {
        Ok(Self {
            fd: AsyncFd::new(fd)?,
            stale_inbound: false,
            stale_outbound: false,
        })
    }

    pub(super) fn mark_stale(&mut self) {
        self.stale_inbound = true;
        self.stale_outbound = true;
    }

    pub(super) fn poll_ready(
        &mut self,
        cx: &mut Context<'_>,
        directions: BlockDirections,
    ) -> Poll<io::Result<()>> {
        let Self {
            fd,
            stale_inbound,
            stale_outbound,
        } = self;

        let directions = directions.or_both();

        // Poll both directions even if the first one is ready, so that
        // both wakers stay registered.
        let inbound = directions.inbound() && poll_direction(fd, cx, true, stale_inbound)?.is_ready();
        let outbound =
            directions.outbound() && poll_direction(fd, cx, false, stale_outbound)?.is_ready();

        if inbound || outbound {
            Poll::Ready(Ok(()))
        } else {
            Poll::Pending
        }
    }
}

fn poll_direction(
    fd: &AsyncFd<RawFd>,
    cx: &mut Context<'_>,
    inbound: bool,
    stale: &mut bool,
) -> Poll<io::Result<()>> {
    // Readiness is stale only if it was set before this poll, anything
    // observed after a `Pending` is a fresh event.
    let mut stale = mem::take(stale);

    loop {
        let mut guard = if inbound {
            ready!(fd.poll_read_ready(cx))?
        } else {
            ready!(fd.poll_write_ready(cx))?
        };

        if !stale {
            break Poll::Ready(Ok(()));
        }
        stale = false;

        // Re-poll to register the waker for the next event.
        guard.clear_ready();
    }
}
