use super::{block_directions, Readiness};
use crate::{BlockDirections, Error, NonBlockingSink, WriteOutcome};

use std::fmt;
use std::io::{self, Write};
use std::task::{Context, Poll};

use ssh2::Session;

/// [`NonBlockingSink`] writing to a remote file opened through
/// [`SshSession::open_remote`](super::SshSession::open_remote).
///
/// libssh2 pipelines the sftp write requests of one call internally and
/// expects the very same buffer to be passed again after `EAGAIN`, which
/// is exactly how [`SlidingUpload`](crate::SlidingUpload) retries.
pub struct SftpSink<'s> {
    pub(super) readiness: &'s mut Readiness,
    pub(super) session: &'s Session,
    pub(super) file: &'s mut ssh2::File,
}

impl fmt::Debug for SftpSink<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SftpSink")
            .field("readiness", &self.readiness)
            .finish_non_exhaustive()
    }
}

impl NonBlockingSink for SftpSink<'_> {
    fn try_write(&mut self, buf: &[u8]) -> Result<WriteOutcome, Error> {
        match self.file.write(buf) {
            Ok(n) => Ok(WriteOutcome::Accepted(n)),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                self.readiness.mark_stale();
                Ok(WriteOutcome::WouldBlock)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn block_directions(&self) -> BlockDirections {
        block_directions(self.session)
    }

    fn poll_ready(
        &mut self,
        cx: &mut Context<'_>,
        directions: BlockDirections,
    ) -> Poll<Result<(), Error>> {
        self.readiness.poll_ready(cx, directions).map_err(Error::from)
    }
}
