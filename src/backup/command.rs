//! Pure construction of the pgBackRest shell command

use std::fmt;
use std::str::FromStr;

use super::{BackupError, Result};

pub const BACKREST_BINARY: &str = "pgbackrest";
pub const REPO_TYPE_S3: &str = "--repo1-type=s3";
pub const NO_REPO_S3_VERIFY_TLS: &str = "--no-repo1-s3-verify-tls";

/// Environment variables read by the executor
pub mod env {
    pub const NAMESPACE: &str = "NAMESPACE";
    pub const COMMAND: &str = "COMMAND";
    pub const COMMAND_OPTS: &str = "COMMAND_OPTS";
    pub const PODNAME: &str = "PODNAME";
    pub const REPO_TYPE: &str = "PGBACKREST_REPO_TYPE";
    pub const LOCAL_S3_STORAGE: &str = "PGHA_PGBACKREST_LOCAL_S3_STORAGE";
    pub const S3_VERIFY_TLS: &str = "PGHA_PGBACKREST_S3_VERIFY_TLS";
    pub const DEBUG: &str = "CRUNCHY_DEBUG";
}

/// pgBackRest subcommands the executor is allowed to run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackupKind {
    StanzaCreate,
    Info,
    Backup,
}

impl BackupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupKind::StanzaCreate => "stanza-create",
            BackupKind::Info => "info",
            BackupKind::Backup => "backup",
        }
    }
}

impl fmt::Display for BackupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackupKind {
    type Err = BackupError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stanza-create" => Ok(BackupKind::StanzaCreate),
            "info" => Ok(BackupKind::Info),
            "backup" => Ok(BackupKind::Backup),
            other => Err(BackupError::UnsupportedCommand(other.to_string())),
        }
    }
}

/// Parse a boolean flag the way the backup images write them.
///
/// Unset or unparseable values are `false`.
pub fn parse_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(str::trim),
        Some("1" | "t" | "T" | "true" | "TRUE" | "True")
    )
}

/// Executor job description read from the environment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackupEnv {
    pub namespace: String,
    pub pod_name: String,
    pub command: BackupCommand,
    pub debug: bool,
}

impl BackupEnv {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the job from an arbitrary variable lookup.
    ///
    /// Required variables are checked in the order NAMESPACE, COMMAND, PODNAME
    /// before the command name itself is validated.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.is_empty())
                .ok_or(BackupError::MissingEnv(name))
        };

        let namespace = required(env::NAMESPACE)?;
        let command = required(env::COMMAND)?;
        let pod_name = required(env::PODNAME)?;

        let kind: BackupKind = command.parse()?;
        let backup = BackupCommand {
            kind,
            options: lookup(env::COMMAND_OPTS).unwrap_or_default(),
            repo_type: lookup(env::REPO_TYPE).unwrap_or_default(),
            local_s3_storage: parse_flag(lookup(env::LOCAL_S3_STORAGE).as_deref()),
            s3_verify_tls: parse_flag(lookup(env::S3_VERIFY_TLS).as_deref()),
        };

        Ok(Self {
            namespace,
            pod_name,
            command: backup,
            debug: lookup(env::DEBUG).as_deref() == Some("true"),
        })
    }
}

/// A pgBackRest invocation and the repository flags that go with it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackupCommand {
    pub kind: BackupKind,
    /// Extra options passed through verbatim
    pub options: String,
    /// Value of `PGBACKREST_REPO_TYPE`, only `s3` is significant
    pub repo_type: String,
    /// Run against the local repository and then again against S3
    pub local_s3_storage: bool,
    pub s3_verify_tls: bool,
}

impl BackupCommand {
    pub fn new(kind: BackupKind) -> Self {
        Self {
            kind,
            options: String::new(),
            repo_type: String::new(),
            local_s3_storage: false,
            s3_verify_tls: false,
        }
    }

    fn base(&self) -> Vec<&str> {
        let mut parts = vec![BACKREST_BINARY, self.kind.as_str()];
        let options = self.options.trim();
        if !options.is_empty() {
            parts.push(options);
        }
        parts
    }

    fn s3_flags(&self) -> Vec<&'static str> {
        let mut flags = vec![REPO_TYPE_S3];
        if !self.s3_verify_tls {
            flags.push(NO_REPO_S3_VERIFY_TLS);
        }
        flags
    }

    /// Shell line handed to `bash` on stdin.
    ///
    /// Local+S3 storage runs the command twice, the second time against the
    /// S3 repository; it takes precedence over `repo_type`.
    pub fn shell_line(&self) -> String {
        let base = self.base();
        let mut parts = base.clone();
        if self.local_s3_storage {
            parts.push("&&");
            parts.extend(base);
            parts.extend(self.s3_flags());
        } else if self.repo_type == "s3" {
            parts.extend(self.s3_flags());
        }
        parts.join(" ")
    }
}

impl fmt::Display for BackupCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.shell_line())
    }
}
