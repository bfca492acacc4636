use std::{io, path::PathBuf, time::Duration};

use thiserror::Error as ThisError;

/// Error returned by [`SlidingUpload`](crate::SlidingUpload) and, with
/// feature `ssh2`, by the sftp session helpers.
#[non_exhaustive]
#[derive(Debug, ThisError)]
pub enum Error {
    /// IO Error (Excluding [`io::ErrorKind::WouldBlock`]): {0}.
    #[error("IO Error (Excluding `io::ErrorKind::WouldBlock`): {0}.")]
    IOError(#[from] io::Error),

    /// The local file to upload cannot be opened.
    #[error("Cannot open local file {path:?}: {source}")]
    OpenLocalFile {
        /// Path of the local file.
        path: PathBuf,
        /// Error returned by the os.
        #[source]
        source: io::Error,
    },

    /// The sink accepted zero bytes too many times in a row without
    /// ever reporting would-block.
    #[error("Sink accepted 0 bytes {attempts} times in a row.")]
    SinkStalled {
        /// Number of consecutive zero-length acceptances.
        attempts: u32,
    },

    /// The sink claimed to accept more bytes than it was offered.
    #[error("Sink accepted {accepted} bytes while only {offered} bytes were offered.")]
    SinkOverAccepted {
        /// Bytes the sink claimed to accept.
        accepted: usize,
        /// Bytes offered to the sink.
        offered: usize,
    },

    /// A configuration value cannot be parsed.
    #[error("Invalid value {value:?} for {name}.")]
    InvalidConfig {
        /// Name of the argument or environment variable.
        name: &'static str,
        /// The rejected value.
        value: String,
    },

    /// The transfer is cancelled through its
    /// [`CancellationToken`](tokio_util::sync::CancellationToken).
    #[error("Transfer is cancelled.")]
    Cancelled,

    /// The transfer did not finish within the configured deadline.
    #[error("Transfer did not finish within {0:?}.")]
    DeadlineExceeded(Duration),

    /// The transfer is aborted after some bytes may have been accepted.
    #[error(transparent)]
    Incomplete(Box<IncompleteTransfer>),

    /// Raised 2 errors when cleaning up.
    #[error(transparent)]
    RecursiveErrors(Box<RecursiveError>),

    /// Error from libssh2.
    #[cfg(feature = "ssh2")]
    #[error("libssh2 error: {0}")]
    SshError(#[from] ssh2::Error),

    /// Server refuses to open the remote file.
    #[cfg(feature = "ssh2")]
    #[error("Unable to open remote file {path:?} with sftp: {source}")]
    OpenRemoteFile {
        /// Path of the remote file.
        path: PathBuf,
        /// Error returned by libssh2.
        #[source]
        source: ssh2::Error,
    },

    /// The session is still not authenticated after the auth exchange.
    #[cfg(feature = "ssh2")]
    #[error("Authentication by {0} failed.")]
    AuthenticationFailed(
        // Use `&&str` since `&str` takes 16 bytes while `&str` only takes 8 bytes.
        &'static &'static str,
    ),
}

impl Error {
    /// Number of bytes accepted by the sink before the transfer aborted.
    ///
    /// Return `None` if the error is not raised by an upload.
    pub fn transferred(&self) -> Option<u64> {
        match self {
            Error::Incomplete(incomplete) => Some(incomplete.transferred),
            Error::RecursiveErrors(err) => err.original_error.transferred(),
            _ => None,
        }
    }
}

/// An upload that aborted with a fatal error.
///
/// Bytes counted by `transferred` are final on the remote side, while the
/// `unsent` ones still buffered locally are lost.
#[derive(Debug, ThisError)]
#[error("Transfer aborted after {transferred} bytes, {unsent} bytes unsent: {error}")]
pub struct IncompleteTransfer {
    /// Bytes accepted by the sink.
    pub transferred: u64,

    /// Bytes read from the source but never accepted by the sink.
    pub unsent: usize,

    /// The error that aborted the transfer.
    #[source]
    pub error: Error,
}

#[derive(Debug, ThisError)]
#[error("OriginalError: {original_error}, curr err raised when cleaning up: {occuring_error}.")]
pub struct RecursiveError {
    /// Original error
    pub original_error: Error,

    /// Current error raised when performing cleanup
    /// for original error.
    #[source]
    pub occuring_error: Error,
}
