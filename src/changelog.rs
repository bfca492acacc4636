#[allow(unused_imports)]
use crate::*;

#[doc(hidden)]
pub mod unreleased {}

/// ## Added
///  - [`SlidingUpload`] and the free function [`upload()`]
///  - [`TransferBuffer`]
///  - Trait [`NonBlockingSink`], [`WriteOutcome`] and [`BlockDirections`]
///  - [`UploadOptions`] with readiness timeout, deadline and zero write budget
///  - [`TransferSummary`]
///  - Mod [`config`]
///  - Mod `session` behind feature `ssh2`
///  - Binary `sftp-write-sliding` behind feature `cli`
pub mod v0_1_0 {}
