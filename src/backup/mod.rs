//! pgBackRest command execution inside a database pod
//!
//! The `pgbackrest-exec` binary reads its job from the environment, builds the
//! pgBackRest shell line with [`BackupCommand`] and streams it to `bash` in the
//! database container through the pod exec API.

mod command;
mod exec;

pub use command::{
    BACKREST_BINARY, BackupCommand, BackupEnv, BackupKind, NO_REPO_S3_VERIFY_TLS, REPO_TYPE_S3,
    parse_flag,
};
pub use exec::{DATABASE_CONTAINER, ExecOutput, exec_in_pod};

use thiserror::Error;

/// Errors raised by the backup executor
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("{0} env var not set")]
    MissingEnv(&'static str),

    #[error("unsupported backup command specified {0}")]
    UnsupportedCommand(String),

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("exec failed: {0}")]
    ExecFailed(String),

    #[error("command failed in pod {pod}: {message}")]
    CommandFailed {
        pod: String,
        message: String,
        output: ExecOutput,
    },
}

impl BackupError {
    /// Captured stdout/stderr, when the command got far enough to produce any
    pub fn output(&self) -> Option<&ExecOutput> {
        match self {
            BackupError::CommandFailed { output, .. } => Some(output),
            _ => None,
        }
    }
}

pub type Result<T, E = BackupError> = std::result::Result<T, E>;
