//! Structured error type for `inspect-fds` operations.

use std::path::PathBuf;
use std::process::ExitStatus;

use crate::Pid;

/// Errors returned by target resolution, descriptor inspection and the
/// process directory backends.
#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    /// The argument is neither a running program name nor a live PID.
    #[error("\"{0}\" doesn't seem to be a valid running program name or PID!")]
    UnresolvableTarget(String),

    /// More than one running program matches the name.
    #[error(
        "\"{name}\" matches several running programs (PIDs {}); pass a PID instead",
        join_pids(.pids)
    )]
    AmbiguousName { name: String, pids: Vec<Pid> },

    /// Could not read the metadata of a process.
    #[error("Cannot inspect PID {pid}: {reason}")]
    PidInspect { pid: Pid, reason: String },

    /// The fd table of a process could not be listed, usually because it
    /// exited between discovery and inspection.
    #[error("Cannot list FDs for PID {pid}: {source}")]
    ProcessVanished { pid: Pid, source: std::io::Error },

    /// The fd table exists but belongs to someone else.
    #[error("Permission denied listing FDs for PID {pid}")]
    PermissionDenied { pid: Pid },

    /// A single descriptor's link or fdinfo could not be read.
    #[error("Cannot resolve fd {fd} of PID {pid}: {source}")]
    FdResolve {
        pid: Pid,
        fd: u32,
        source: std::io::Error,
    },

    /// The `flags:` field of an fdinfo file is missing or not octal.
    #[error("Malformed fdinfo for fd {fd} of PID {pid}: {reason}")]
    MalformedFdInfo { pid: Pid, fd: u32, reason: String },

    /// The procfs root itself could not be scanned.
    #[error("Cannot scan {}: {source}", path.display())]
    ProcScan {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An external listing utility could not be started.
    #[error("Failed to run `{program}`: {source}")]
    Command {
        program: String,
        source: std::io::Error,
    },

    /// An external listing utility exited with an unexpected status.
    #[error("`{program}` failed ({status}): {stderr}")]
    CommandStatus {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    /// The config file exists but could not be read.
    #[error("Cannot read config {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`crate::config::Config`].
    #[error("Invalid config {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Writing the report failed.
    #[error("Failed to write report: {0}")]
    Output(#[from] std::io::Error),
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, InspectError>;

fn join_pids(pids: &[Pid]) -> String {
    pids.iter()
        .map(|pid| pid.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
