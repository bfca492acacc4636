//! Upload one file over sftp with a non-blocking libssh2 session.
//!
//! ```text
//! sftp-write-sliding 192.168.0.1 user password thisfile /tmp/storehere
//! ```
//!
//! See [`sftp_sliding_upload::config`] for the environment variables.

use std::process::ExitCode;

use sftp_sliding_upload::{config::UploadConfig, session::upload_file, CancellationToken};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match UploadConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    tracing::debug!(?config, "starting upload");

    let cancel_token = CancellationToken::new();
    let ctrl_c_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_token.cancel();
        }
    });

    let code = match upload_file(&config, cancel_token).await {
        Ok(summary) => {
            tracing::info!("{summary}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            if let Some(transferred) = err.transferred() {
                tracing::error!(transferred, "upload failed: {err}");
            } else {
                tracing::error!("upload failed: {err}");
            }
            ExitCode::FAILURE
        }
    };

    tracing::info!("all done");

    code
}
