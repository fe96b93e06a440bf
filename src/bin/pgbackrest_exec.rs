//! Runs a single pgBackRest command inside a PostgreSQL repository pod.
//!
//! Every failure exits with status 2 so the owning Job records it as failed.

use std::process::ExitCode;

use k8s_openapi::api::core::v1::Pod;
use kube::{Api, Client};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use postgres_bridge_operator::backup::{BackupEnv, BackupError, exec_in_pod};

const FAILURE_EXIT_CODE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let debug_enabled = std::env::var("CRUNCHY_DEBUG").ok().as_deref() == Some("true");
    let level = if debug_enabled { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new(format!(
                    "pgbackrest_exec={level},postgres_bridge_operator={level},kube=info"
                ))
            }),
        )
        .init();

    info!("pgbackrest-exec starts");
    debug!(debug = debug_enabled, "debug flag");

    match run().await {
        Ok(()) => {
            info!("pgbackrest-exec ends");
            ExitCode::SUCCESS
        }
        Err(e) => {
            if let Some(output) = e.output() {
                info!(output = %output.stdout, stderr = %output.stderr, "command output");
            }
            error!(error = %e, "pgbackrest-exec failed");
            ExitCode::from(FAILURE_EXIT_CODE)
        }
    }
}

async fn run() -> Result<(), BackupError> {
    let job = BackupEnv::from_env()?;
    debug!(
        namespace = %job.namespace,
        pod = %job.pod_name,
        command = %job.command.kind,
        options = %job.command.options,
        repo_type = %job.command.repo_type,
        local_s3_storage = job.command.local_s3_storage,
        s3_verify_tls = job.command.s3_verify_tls,
        "loaded backup job"
    );

    if job.command.local_s3_storage {
        info!("backrest command will be executed for both local and s3 storage");
    } else if job.command.repo_type == "s3" {
        info!("s3 flag enabled for backrest command");
    }
    if !job.command.s3_verify_tls {
        debug!("s3 TLS verification disabled");
    }

    let shell_line = job.command.shell_line();
    info!(command = %shell_line, "command to execute");

    let client = Client::try_default().await?;
    let pods: Api<Pod> = Api::namespaced(client, &job.namespace);
    let output = exec_in_pod(&pods, &job.pod_name, &shell_line).await?;

    info!(output = %output.stdout, stderr = %output.stderr, "command output");
    Ok(())
}
