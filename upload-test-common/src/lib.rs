use std::cmp::min;
use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Buf, Bytes};
use once_cell::sync::OnceCell;
use tokio::io::{AsyncRead, ReadBuf};

/// Deterministic pseudo random content, so that any dropped or reordered
/// byte shows up in comparisons.
pub fn gen_content(len: usize, seed: u64) -> Bytes {
    // xorshift64, must not start from 0.
    let mut state = seed | 1;

    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 24) as u8
        })
        .collect::<Vec<u8>>()
        .into()
}

/// 2,500,000 bytes of content, generated once per test binary.
pub fn large_content() -> Bytes {
    static LARGE_CONTENT: OnceCell<Bytes> = OnceCell::new();

    LARGE_CONTENT
        .get_or_init(|| gen_content(2_500_000, 0x5f7e_1d2c))
        .clone()
}

/// One response of [`ScriptedReader`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ReadStep {
    /// Return at most this many bytes. `Chunk(0)` reads as end-of-data.
    Chunk(usize),
    /// Return `Poll::Pending` and wake immediately.
    Pending,
    /// Fail with [`io::ErrorKind::Interrupted`].
    Interrupted,
    /// Fail with [`io::ErrorKind::WouldBlock`].
    WouldBlock,
    /// Fail with [`io::ErrorKind::Other`].
    Fail,
}

/// [`AsyncRead`] over in-memory content following a script of responses.
///
/// Once the script is exhausted, every read returns at most `chunk` bytes.
#[derive(Debug)]
pub struct ScriptedReader {
    data: Bytes,
    script: VecDeque<ReadStep>,
    chunk: usize,
    polls: usize,
}

impl ScriptedReader {
    pub fn new(data: Bytes, chunk: usize) -> Self {
        Self {
            data,
            script: VecDeque::new(),
            chunk,
            polls: 0,
        }
    }

    #[must_use]
    pub fn script(mut self, steps: impl IntoIterator<Item = ReadStep>) -> Self {
        self.script.extend(steps);
        self
    }

    /// Number of times the reader has been polled.
    pub fn polls(&self) -> usize {
        self.polls
    }

    /// Bytes not read yet.
    pub fn remaining(&self) -> usize {
        self.data.len()
    }
}

impl AsyncRead for ScriptedReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;

        this.polls += 1;

        match this.script.pop_front().unwrap_or(ReadStep::Chunk(this.chunk)) {
            ReadStep::Chunk(n) => {
                let n = min(min(n, buf.remaining()), this.data.len());
                buf.put_slice(&this.data[..n]);
                this.data.advance(n);

                Poll::Ready(Ok(()))
            }
            ReadStep::Pending => {
                cx.waker().wake_by_ref();
                Poll::Pending
            }
            ReadStep::Interrupted => Poll::Ready(Err(io::ErrorKind::Interrupted.into())),
            ReadStep::WouldBlock => Poll::Ready(Err(io::ErrorKind::WouldBlock.into())),
            ReadStep::Fail => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::Other,
                "scripted read failure",
            ))),
        }
    }
}
