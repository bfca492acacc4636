#![allow(dead_code)]

use std::cmp::min;
use std::collections::VecDeque;
use std::io;
use std::num::NonZeroUsize;
use std::task::{Context, Poll};
use std::time::Duration;

use sftp_sliding_upload::{
    BlockDirections, Error, IncompleteTransfer, NonBlockingSink, UploadOptions, WriteOutcome,
};
use bytes::BytesMut;

/// One response of [`MockSink::try_write`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Step {
    /// Take at most this many bytes.
    Accept(usize),
    /// Take everything offered.
    AcceptAll,
    WouldBlock,
    /// Take nothing without reporting would-block.
    Zero,
    /// Claim one byte more than offered.
    OverAccept,
    Fail,
}

#[derive(Debug)]
pub struct MockSink {
    script: VecDeque<Step>,
    fallback: Step,
    never_ready: bool,
    directions: BlockDirections,

    /// Concatenation of every accepted chunk.
    pub received: BytesMut,
    /// Length of every buffer offered.
    pub offered: Vec<usize>,
    pub write_calls: usize,
    /// Directions of every readiness poll.
    pub ready_polls: Vec<BlockDirections>,
}

impl MockSink {
    pub fn new() -> Self {
        Self {
            script: VecDeque::new(),
            fallback: Step::AcceptAll,
            never_ready: false,
            directions: BlockDirections::Outbound,

            received: BytesMut::new(),
            offered: Vec::new(),
            write_calls: 0,
            ready_polls: Vec::new(),
        }
    }

    pub fn script(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.script.extend(steps);
        self
    }

    /// Response once the script is exhausted.
    pub fn fallback(mut self, step: Step) -> Self {
        self.fallback = step;
        self
    }

    /// Readiness polls stay pending forever.
    pub fn never_ready(mut self) -> Self {
        self.never_ready = true;
        self
    }

    pub fn directions(mut self, directions: BlockDirections) -> Self {
        self.directions = directions;
        self
    }

    fn accept(&mut self, buf: &[u8], n: usize) -> Result<WriteOutcome, Error> {
        let n = min(n, buf.len());
        self.received.extend_from_slice(&buf[..n]);
        Ok(WriteOutcome::Accepted(n))
    }
}

impl NonBlockingSink for MockSink {
    fn try_write(&mut self, buf: &[u8]) -> Result<WriteOutcome, Error> {
        self.write_calls += 1;
        self.offered.push(buf.len());

        match self.script.pop_front().unwrap_or(self.fallback) {
            Step::Accept(n) => self.accept(buf, n),
            Step::AcceptAll => self.accept(buf, buf.len()),
            Step::WouldBlock => Ok(WriteOutcome::WouldBlock),
            Step::Zero => Ok(WriteOutcome::Accepted(0)),
            Step::OverAccept => Ok(WriteOutcome::Accepted(buf.len() + 1)),
            Step::Fail => Err(Error::IOError(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "scripted sink failure",
            ))),
        }
    }

    fn block_directions(&self) -> BlockDirections {
        self.directions
    }

    fn poll_ready(
        &mut self,
        _cx: &mut Context<'_>,
        directions: BlockDirections,
    ) -> Poll<Result<(), Error>> {
        self.ready_polls.push(directions);

        if self.never_ready {
            Poll::Pending
        } else {
            Poll::Ready(Ok(()))
        }
    }
}

pub fn options(capacity: usize) -> UploadOptions {
    UploadOptions::new()
        .buffer_capacity(NonZeroUsize::new(capacity).unwrap())
        .readiness_timeout(Duration::from_secs(5))
}

pub fn into_incomplete(err: Error) -> IncompleteTransfer {
    match err {
        Error::Incomplete(incomplete) => *incomplete,
        err => panic!("expected an incomplete transfer, got {err:?}"),
    }
}
