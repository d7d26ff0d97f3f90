//! [`ProcessDirectory`] backed by the `ps(1)` and `pgrep(1)` utilities.
//!
//! Both tools exit with status 1 when nothing matches, which is treated as an
//! empty answer rather than a failure.

use std::process::Command;

use log::debug;

use crate::directory::{ProcessDirectory, ProcessEntry};
use crate::error::{InspectError, Result};
use crate::Pid;

/// Process lookups through procps command-line tools.
#[derive(Debug, Clone)]
pub struct PsDirectory {
    self_pid: Pid,
}

impl Default for PsDirectory {
    fn default() -> Self {
        Self {
            self_pid: std::process::id(),
        }
    }
}

impl PsDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProcessDirectory for PsDirectory {
    fn by_id(&self, pid: Pid) -> Result<Option<ProcessEntry>> {
        let pid_arg = pid.to_string();
        let args = ["-ww", "--pid", pid_arg.as_str(), "-o", "pid=,ppid=,cmd="];
        let Some(stdout) = run("ps", &args)? else {
            return Ok(None);
        };
        Ok(stdout.lines().find_map(parse_ps_entry))
    }

    fn by_parent_id(&self, ppid: Pid) -> Result<Vec<Pid>> {
        let ppid_arg = ppid.to_string();
        let stdout = run("ps", &["--ppid", ppid_arg.as_str(), "-o", "pid="])?;
        Ok(stdout.map(|s| parse_pid_list(&s)).unwrap_or_default())
    }

    fn by_owner_and_name(&self, uid: u32, pattern: &str) -> Result<Vec<Pid>> {
        let uid_arg = uid.to_string();
        let stdout = run("pgrep", &["-U", uid_arg.as_str(), "--", pattern])?;
        Ok(stdout
            .map(|s| parse_pid_list(&s))
            .unwrap_or_default()
            .into_iter()
            .filter(|&pid| pid != self.self_pid)
            .collect())
    }
}

/// Runs `program`, returning its stdout, or `None` when it reports no match.
fn run(program: &str, args: &[&str]) -> Result<Option<String>> {
    debug!("running {program} {}", args.join(" "));

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| InspectError::Command {
            program: program.to_string(),
            source,
        })?;

    if output.status.success() {
        return Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()));
    }
    if output.status.code() == Some(1) {
        return Ok(None);
    }

    Err(InspectError::CommandStatus {
        program: program.to_string(),
        status: output.status,
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

/// Parses one `pid= ppid= cmd=` line. The name is the first word of `cmd`.
fn parse_ps_entry(line: &str) -> Option<ProcessEntry> {
    let mut fields = line.split_whitespace();
    let pid = fields.next()?.parse().ok()?;
    let ppid = fields.next()?.parse().ok()?;
    let name = fields.next()?.to_string();
    Some(ProcessEntry { pid, ppid, name })
}

/// Parses whitespace-separated pids, skipping anything else.
fn parse_pid_list(stdout: &str) -> Vec<Pid> {
    stdout
        .split_whitespace()
        .filter_map(|word| word.parse().ok())
        .collect()
}
