//! Configuration of a single file upload over sftp, as taken by the
//! `sftp-write-sliding` program.
//!
//! Positional arguments are `[host[:port]] [user] [password] [local file]
//! [remote path]`, every one of them optional. Environment variables:
//!
//!  - `SFTP_PRIVATE_KEY`: authenticate with this private key file instead
//!    of the password, the password is then used as its passphrase.
//!  - `SFTP_PUBLIC_KEY`: public key matching `SFTP_PRIVATE_KEY`.
//!  - `SFTP_BUFFER_CAPACITY`: capacity of the transfer buffer in bytes.
//!  - `SFTP_READINESS_TIMEOUT_SECS`: bound of a single readiness wait.
//!  - `SFTP_DEADLINE_SECS`: deadline of the whole transfer.
//!  - `SFTP_REMOTE_MODE`: permission of the remote file, in octal.

use super::{Error, UploadOptions};

use std::env;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 22;
pub const DEFAULT_USERNAME: &str = "username";
pub const DEFAULT_PASSWORD: &str = "password";
pub const DEFAULT_LOCAL_FILE: &str = "sftp_write_nonblock.c";
pub const DEFAULT_REMOTE_PATH: &str = "/tmp/sftp_write_nonblock.c";

/// `rw-r--r--`
pub const DEFAULT_REMOTE_MODE: i32 = 0o644;

/// How to authenticate against the ssh server.
#[derive(Clone, Eq, PartialEq)]
pub enum Auth {
    Password(String),

    PublicKeyFile {
        public_key: Option<PathBuf>,
        private_key: PathBuf,
        passphrase: Option<String>,
    },
}

impl Auth {
    /// Name of the method, for diagnostics.
    pub fn method(&self) -> &'static &'static str {
        match self {
            Auth::Password(_) => &"password",
            Auth::PublicKeyFile { .. } => &"public key",
        }
    }
}

// Keep secrets out of logs.
impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::Password(_) => f.debug_tuple("Password").field(&"..").finish(),
            Auth::PublicKeyFile {
                public_key,
                private_key,
                passphrase,
            } => f
                .debug_struct("PublicKeyFile")
                .field("public_key", public_key)
                .field("private_key", private_key)
                .field("passphrase", &passphrase.as_ref().map(|_| ".."))
                .finish(),
        }
    }
}

/// Everything needed to upload one local file to one remote path.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct UploadConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth: Auth,
    pub local_path: PathBuf,
    pub remote_path: PathBuf,
    pub remote_mode: i32,
    pub options: UploadOptions,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            username: DEFAULT_USERNAME.into(),
            auth: Auth::Password(DEFAULT_PASSWORD.into()),
            local_path: DEFAULT_LOCAL_FILE.into(),
            remote_path: DEFAULT_REMOTE_PATH.into(),
            remote_mode: DEFAULT_REMOTE_MODE,
            options: UploadOptions::new(),
        }
    }
}

impl UploadConfig {
    /// Build from the arguments and environment of the current process.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_args_and_env(env::args().skip(1), |name| env::var(name).ok())
    }

    /// Build from `args`, not including the program name, and environment
    /// variables looked up with `var`.
    pub fn from_args_and_env<I, F>(args: I, var: F) -> Result<Self, Error>
    where
        I: IntoIterator<Item = String>,
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let mut args = args.into_iter();

        if let Some(addr) = args.next() {
            let (host, port) = split_host_port(&addr)?;
            config.host = host;
            config.port = port;
        }
        if let Some(username) = args.next() {
            config.username = username;
        }
        let password = args.next().unwrap_or_else(|| DEFAULT_PASSWORD.into());
        if let Some(local_path) = args.next() {
            config.local_path = local_path.into();
        }
        if let Some(remote_path) = args.next() {
            config.remote_path = remote_path.into();
        }
        if let Some(extra) = args.next() {
            return Err(Error::InvalidConfig {
                name: "arguments",
                value: extra,
            });
        }

        config.auth = match var("SFTP_PRIVATE_KEY") {
            Some(private_key) => Auth::PublicKeyFile {
                public_key: var("SFTP_PUBLIC_KEY").map(PathBuf::from),
                private_key: private_key.into(),
                passphrase: Some(password),
            },
            None => Auth::Password(password),
        };

        let mut options = UploadOptions::new();

        if let Some(value) = var("SFTP_BUFFER_CAPACITY") {
            options = options.buffer_capacity(parse::<NonZeroUsize>("SFTP_BUFFER_CAPACITY", value)?);
        }
        if let Some(value) = var("SFTP_READINESS_TIMEOUT_SECS") {
            let secs = parse::<u64>("SFTP_READINESS_TIMEOUT_SECS", value)?;
            options = options.readiness_timeout(Duration::from_secs(secs));
        }
        if let Some(value) = var("SFTP_DEADLINE_SECS") {
            let secs = parse::<u64>("SFTP_DEADLINE_SECS", value)?;
            options = options.deadline(Duration::from_secs(secs));
        }
        config.options = options;

        if let Some(value) = var("SFTP_REMOTE_MODE") {
            config.remote_mode =
                i32::from_str_radix(&value, 8).map_err(|_| Error::InvalidConfig {
                    name: "SFTP_REMOTE_MODE",
                    value,
                })?;
        }

        Ok(config)
    }
}

fn parse<T: FromStr>(name: &'static str, value: String) -> Result<T, Error> {
    value
        .parse()
        .map_err(|_| Error::InvalidConfig { name, value })
}

/// Split `host`, `host:port`, `[v6]` or `[v6]:port`.
///
/// A bare ipv6 address is taken as a host without port.
fn split_host_port(addr: &str) -> Result<(String, u16), Error> {
    let invalid = || Error::InvalidConfig {
        name: "host",
        value: addr.into(),
    };

    if let Some(rest) = addr.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;

        let port = if tail.is_empty() {
            DEFAULT_PORT
        } else {
            let port = tail.strip_prefix(':').ok_or_else(invalid)?;
            port.parse().map_err(|_| invalid())?
        };

        return Ok((host.into(), port));
    }

    match addr.split_once(':') {
        Some((host, port)) if !port.contains(':') => {
            let port = port.parse().map_err(|_| invalid())?;
            Ok((host.into(), port))
        }
        _ => Ok((addr.into(), DEFAULT_PORT)),
    }
}
