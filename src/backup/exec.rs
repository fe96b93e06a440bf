//! Pod exec transport for the backup command

use k8s_openapi::api::core::v1::Pod;
use kube::Api;
use kube::api::AttachParams;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use super::{BackupError, Result};

/// Container in the repository pod that carries pgBackRest
pub const DATABASE_CONTAINER: &str = "database";

/// Captured output of a command run in a pod
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run `shell_line` through `bash` in the database container of `pod_name`.
///
/// The line is written to stdin so options are never re-split by the exec API.
pub async fn exec_in_pod(pods: &Api<Pod>, pod_name: &str, shell_line: &str) -> Result<ExecOutput> {
    let attach_params = AttachParams {
        container: Some(DATABASE_CONTAINER.to_string()),
        stdin: true,
        stdout: true,
        stderr: true,
        tty: false,
        ..Default::default()
    };

    debug!(pod = %pod_name, "attaching to pod");
    let mut attached = pods.exec(pod_name, vec!["bash"], &attach_params).await?;

    if let Some(mut stdin) = attached.stdin() {
        stdin.write_all(shell_line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.shutdown().await?;
    }

    let stdout = attached
        .stdout()
        .ok_or_else(|| BackupError::ExecFailed("Failed to get stdout from exec".to_string()))?;
    let stderr = attached
        .stderr()
        .ok_or_else(|| BackupError::ExecFailed("Failed to get stderr from exec".to_string()))?;

    let (stdout, stderr) = tokio::try_join!(read_stream(stdout), read_stream(stderr))?;
    let output = ExecOutput { stdout, stderr };

    let status = attached
        .take_status()
        .ok_or_else(|| BackupError::ExecFailed("Failed to get status from exec".to_string()))?;

    if let Some(status) = status.await
        && status.status.as_deref() != Some("Success")
    {
        let message = status
            .message
            .clone()
            .unwrap_or_else(|| format!("Command failed with status: {:?}", status.status));
        return Err(BackupError::CommandFailed {
            pod: pod_name.to_string(),
            message,
            output,
        });
    }

    Ok(output)
}

async fn read_stream<R: AsyncRead + Unpin>(mut reader: R) -> Result<String> {
    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer).await?;
    Ok(String::from_utf8_lossy(&buffer).to_string())
}
