//! Non-blocking sliding buffer upload.
//!
//! [`SlidingUpload`] streams any [`tokio::io::AsyncRead`] into a
//! [`NonBlockingSink`], a channel that may accept only part of what it is
//! offered or report that it would block. Unsent bytes are kept in a fixed
//! capacity [`TransferBuffer`] and offered again, in order, once the sink is
//! ready.
//!
//! With feature `ssh2`, [`session`] provides a sink backed by a libssh2
//! sftp file running in non-blocking mode, together with the session setup
//! around it.

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod buffer;
mod error;
mod options;
mod sink;
mod summary;
mod upload;
#[cfg_attr(not(feature = "ssh2"), allow(dead_code))]
mod utils;

pub mod config;

#[cfg(feature = "ssh2")]
#[cfg_attr(docsrs, doc(cfg(feature = "ssh2")))]
pub mod session;

#[cfg(doc)]
/// Changelog for this crate.
pub mod changelog;

pub use buffer::TransferBuffer;
pub use error::{Error, IncompleteTransfer, RecursiveError};
pub use options::UploadOptions;
pub use sink::{BlockDirections, NonBlockingSink, WriteOutcome};
pub use summary::TransferSummary;
pub use upload::{upload, SlidingUpload};

pub use tokio_util::sync::CancellationToken;
