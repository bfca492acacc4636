//! Sftp upload over a libssh2 session running in non-blocking mode.
//!
//! Every libssh2 call made here may return `EAGAIN`, in which case the
//! caller waits on the session socket, in the direction libssh2 reports
//! being blocked on, and calls again.

use crate::{
    config::{Auth, UploadConfig},
    utils::merge_cleanup,
    BlockDirections, CancellationToken, Error, SlidingUpload, TransferSummary,
};

use std::future::poll_fn;
use std::os::raw::c_int;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::time::Duration;

use ssh2::{ErrorCode, HashType, OpenFlags, OpenType, Session};
use tokio::fs::File;
use tokio::io::AsyncRead;
use tokio::net::TcpStream;
use tokio::time;

mod readiness;
use readiness::Readiness;

mod sftp_sink;
pub use sftp_sink::SftpSink;

const LIBSSH2_ERROR_EAGAIN: c_int = -37;

fn would_block(err: &ssh2::Error) -> bool {
    matches!(err.code(), ErrorCode::Session(LIBSSH2_ERROR_EAGAIN))
}

fn block_directions(session: &Session) -> BlockDirections {
    match session.block_directions() {
        ssh2::BlockDirections::None => BlockDirections::None,
        ssh2::BlockDirections::Inbound => BlockDirections::Inbound,
        ssh2::BlockDirections::Outbound => BlockDirections::Outbound,
        ssh2::BlockDirections::Both => BlockDirections::Both,
    }
}

/// Run `f` with the session switched to blocking mode.
///
/// libssh2 handles dropped in non-blocking mode may give up on `EAGAIN`
/// and leak the remote resource.
fn in_blocking_mode<T>(session: &Session, f: impl FnOnce() -> T) -> T {
    session.set_blocking(true);
    let _restore = scopeguard::guard((), |()| session.set_blocking(false));
    f()
}

/// Render a host key hash as upper-case hex pairs separated by spaces.
pub fn format_fingerprint(hash: &[u8]) -> String {
    hash.iter()
        .map(|byte| format!("{byte:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// An ssh session in non-blocking mode together with the readiness of its
/// socket.
pub struct SshSession {
    /// Declared first so that it deregisters before `session`
    /// closes the socket.
    readiness: Readiness,
    session: Session,
    readiness_timeout: Duration,
}

impl std::fmt::Debug for SshSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshSession")
            .field("readiness", &self.readiness)
            .field("readiness_timeout", &self.readiness_timeout)
            .finish_non_exhaustive()
    }
}

impl SshSession {
    /// Connect to `host:port` and perform the ssh handshake.
    ///
    /// `readiness_timeout` bounds every single wait on the socket, after
    /// which the pending libssh2 call is simply retried.
    pub async fn connect(host: &str, port: u16, readiness_timeout: Duration) -> Result<Self, Error> {
        // tokio hands the socket back in non-blocking mode.
        let stream = TcpStream::connect((host, port)).await?.into_std()?;

        let readiness = Readiness::new(stream.as_raw_fd())?;

        let mut session = Session::new()?;
        session.set_tcp_stream(stream);
        session.set_blocking(false);

        let mut this = Self {
            readiness,
            session,
            readiness_timeout,
        };

        this.retry(|session| session.handshake()).await?;

        #[cfg(feature = "tracing")]
        tracing::debug!(host, port, "ssh handshake done");

        Ok(this)
    }

    /// SHA-1 hash of the server host key, see [`format_fingerprint`].
    ///
    /// Verifying it is up to the caller.
    pub fn host_key_fingerprint(&self) -> Option<String> {
        self.session
            .host_key_hash(HashType::Sha1)
            .map(format_fingerprint)
    }

    pub async fn authenticate(&mut self, username: &str, auth: &Auth) -> Result<(), Error> {
        match auth {
            Auth::Password(password) => {
                self.retry(|session| session.userauth_password(username, password))
                    .await?
            }
            Auth::PublicKeyFile {
                public_key,
                private_key,
                passphrase,
            } => {
                self.retry(|session| {
                    session.userauth_pubkey_file(
                        username,
                        public_key.as_deref(),
                        private_key,
                        passphrase.as_deref(),
                    )
                })
                .await?
            }
        }

        if self.session.authenticated() {
            Ok(())
        } else {
            Err(Error::AuthenticationFailed(auth.method()))
        }
    }

    /// Start the sftp subsystem and open `path` for writing, creating or
    /// truncating it.
    pub async fn open_remote(&mut self, path: &Path, mode: i32) -> Result<RemoteFile, Error> {
        let sftp = self.retry(|session| session.sftp()).await?;

        #[cfg(feature = "tracing")]
        tracing::debug!("sftp subsystem started");

        let mut remote = RemoteFile {
            file: None,
            sftp: Some(sftp),
            session: self.session.clone(),
        };

        let sftp = remote
            .sftp
            .as_ref()
            .expect("RemoteFile::sftp is just set to Some");

        let flags = OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE;

        let res = self
            .retry(|_| sftp.open_mode(path, flags, mode, OpenType::File))
            .await;

        let file = match res {
            Err(Error::SshError(source)) => {
                return Err(Error::OpenRemoteFile {
                    path: path.into(),
                    source,
                })
            }
            res => res?,
        };
        remote.file = Some(file);

        #[cfg(feature = "tracing")]
        tracing::debug!(?path, "remote file opened");

        Ok(remote)
    }

    /// Close the remote file and shut the sftp subsystem down.
    pub async fn close_remote(&mut self, mut remote: RemoteFile) -> Result<(), Error> {
        if let Some(file) = remote.file.as_mut() {
            self.retry(|_| file.close()).await?;
        }
        remote.file = None;

        if let Some(sftp) = remote.sftp.as_mut() {
            self.retry(|_| sftp.shutdown()).await?;
        }
        remote.sftp = None;

        Ok(())
    }

    /// Upload `source` into `remote`.
    pub async fn upload<R>(
        &mut self,
        upload: &mut SlidingUpload,
        source: R,
        remote: &mut RemoteFile,
    ) -> Result<TransferSummary, Error>
    where
        R: AsyncRead + Unpin,
    {
        let sink = SftpSink {
            readiness: &mut self.readiness,
            session: &self.session,
            file: remote.file_mut(),
        };

        upload.run(source, sink).await
    }

    /// Disconnect and release the session.
    pub async fn close(mut self) -> Result<(), Error> {
        self.retry(|session| session.disconnect(None, "Normal Shutdown", None))
            .await
    }

    /// Call `f` until it returns anything but `EAGAIN`.
    async fn retry<T, F>(&mut self, mut f: F) -> Result<T, Error>
    where
        F: FnMut(&mut Session) -> Result<T, ssh2::Error>,
    {
        loop {
            match f(&mut self.session) {
                Err(err) if would_block(&err) => self.wait().await?,
                res => break res.map_err(Error::from),
            }
        }
    }

    async fn wait(&mut self) -> Result<(), Error> {
        let directions = block_directions(&self.session).or_both();
        let readiness_timeout = self.readiness_timeout;
        let readiness = &mut self.readiness;

        readiness.mark_stale();

        match time::timeout(
            readiness_timeout,
            poll_fn(|cx| readiness.poll_ready(cx, directions)),
        )
        .await
        {
            Ok(res) => Ok(res?),
            Err(_elapsed) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(?readiness_timeout, ?directions, "socket is still not ready");

                Ok(())
            }
        }
    }
}

/// A remote file opened for writing, and the sftp subsystem it lives in.
///
/// Pass it to [`SshSession::close_remote`] to release it; dropping it
/// releases both handles in blocking mode instead.
pub struct RemoteFile {
    file: Option<ssh2::File>,
    sftp: Option<ssh2::Sftp>,
    session: Session,
}

impl std::fmt::Debug for RemoteFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteFile")
            .field("is_open", &self.file.is_some())
            .finish_non_exhaustive()
    }
}

impl RemoteFile {
    fn file_mut(&mut self) -> &mut ssh2::File {
        self.file
            .as_mut()
            .expect("RemoteFile::file is only taken by SshSession::close_remote")
    }
}

impl Drop for RemoteFile {
    fn drop(&mut self) {
        if self.file.is_none() && self.sftp.is_none() {
            return;
        }

        #[cfg(feature = "tracing")]
        tracing::warn!("remote file dropped without being closed, closing it in blocking mode");

        let (file, sftp) = (self.file.take(), self.sftp.take());

        in_blocking_mode(&self.session, || {
            drop(file);
            drop(sftp);
        });
    }
}

/// Upload `config.local_path` to `config.remote_path`.
///
/// The local file is opened first, then the session is established,
/// authenticated, used for the transfer and shut down. Resources are
/// released on every path, and an error raised while releasing them after
/// another error is reported as [`Error::RecursiveErrors`].
pub async fn upload_file(
    config: &UploadConfig,
    cancel_token: CancellationToken,
) -> Result<TransferSummary, Error> {
    let local = File::open(&config.local_path)
        .await
        .map_err(|source| Error::OpenLocalFile {
            path: config.local_path.clone(),
            source,
        })?;

    let readiness_timeout = config.options.get_readiness_timeout();
    let mut session = SshSession::connect(&config.host, config.port, readiness_timeout).await?;

    if let Some(_fingerprint) = session.host_key_fingerprint() {
        #[cfg(feature = "tracing")]
        tracing::info!("Fingerprint: {_fingerprint}");
    }

    let res = transfer(&mut session, config, local, cancel_token).await;

    merge_cleanup(res, session.close().await)
}

async fn transfer(
    session: &mut SshSession,
    config: &UploadConfig,
    local: File,
    cancel_token: CancellationToken,
) -> Result<TransferSummary, Error> {
    session.authenticate(&config.username, &config.auth).await?;

    let mut remote = session
        .open_remote(&config.remote_path, config.remote_mode)
        .await?;

    #[cfg(feature = "tracing")]
    tracing::info!(remote_path = ?config.remote_path, "sending data");

    let mut upload = SlidingUpload::new(config.options).with_cancellation_token(cancel_token);

    let res = session.upload(&mut upload, local, &mut remote).await;

    merge_cleanup(res, session.close_remote(remote).await)
}
