//! Process discovery.
//!
//! The report needs three questions answered about running processes: who is
//! this pid, who are its children, and which of my processes has this name.
//! [`ProcessDirectory`] is that interface; the platform module provides a
//! procfs reader and a `ps`/`pgrep` fallback.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::Pid;

/// What a process directory knows about one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: Pid,
    pub ppid: Pid,
    /// First word of the command line, e.g. `/usr/bin/python3`.
    pub name: String,
}

/// Looks up running processes.
pub trait ProcessDirectory {
    /// Returns the process with id `pid`, or `None` if it does not exist.
    fn by_id(&self, pid: Pid) -> Result<Option<ProcessEntry>>;

    /// Returns the direct children of `ppid`, ordered by pid.
    fn by_parent_id(&self, ppid: Pid) -> Result<Vec<Pid>>;

    /// Returns processes owned by real user `uid` whose name contains
    /// `pattern`, ordered by pid. The calling process is never included.
    fn by_owner_and_name(&self, uid: u32, pattern: &str) -> Result<Vec<Pid>>;
}

/// Which [`ProcessDirectory`] implementation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Read `/proc` directly.
    #[default]
    Procfs,
    /// Shell out to `ps` and `pgrep`.
    Ps,
}
