//! Linux implementation on top of procfs.
//!
//! - **Descriptor listing** reads the entries of `/proc/<pid>/fd`.
//! - **Descriptor details** follow the `fd/<n>` symlink for the target and
//!   parse the `flags:` line of `fdinfo/<n>` for the access mode.
//! - **Process discovery** ([`ProcfsDirectory`]) parses `stat`, `status` and
//!   `cmdline`; [`ps::PsDirectory`] asks `ps(1)` and `pgrep(1)` instead.
//!
//! Every path is relative to a configurable root so a fake tree can stand in
//! for `/proc`.

pub mod ps;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

use crate::descriptor::{parse_fdinfo_flags, AccessMode, DescriptorInfo, DescriptorSource, FdTarget};
use crate::directory::{ProcessDirectory, ProcessEntry};
use crate::error::{InspectError, Result};
use crate::Pid;

/// Default procfs mount point.
pub const PROC_ROOT: &str = "/proc";

/// Handle on a procfs mount.
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::with_root(PROC_ROOT)
    }
}

impl ProcFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `root` in place of `/proc`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn pid_dir(&self, pid: Pid) -> PathBuf {
        self.root.join(pid.to_string())
    }

    /// Lists every numeric entry of the root, ascending.
    pub fn pids(&self) -> Result<Vec<Pid>> {
        let entries = fs::read_dir(&self.root).map_err(|source| InspectError::ProcScan {
            path: self.root.clone(),
            source,
        })?;

        let mut pids: Vec<Pid> = entries
            .flatten()
            .filter_map(|entry| entry.file_name().to_str()?.parse().ok())
            .collect();
        pids.sort_unstable();
        Ok(pids)
    }

    /// Reads and parses `<pid>/stat`, or `None` if the process is gone.
    pub fn stat(&self, pid: Pid) -> Result<Option<Stat>> {
        let path = self.pid_dir(pid).join("stat");
        let Some(content) = read_if_present(&path)? else {
            return Ok(None);
        };
        parse_stat(&content)
            .map(Some)
            .ok_or_else(|| InspectError::PidInspect {
                pid,
                reason: format!("unparsable {}", path.display()),
            })
    }

    /// Real uid of `pid` from `<pid>/status`.
    pub fn uid(&self, pid: Pid) -> Result<Option<u32>> {
        let path = self.pid_dir(pid).join("status");
        Ok(read_if_present(&path)?.and_then(|content| parse_status_uid(&content)))
    }

    /// Raw `<pid>/cmdline`, or `None` if the process is gone.
    pub fn cmdline(&self, pid: Pid) -> Result<Option<String>> {
        read_if_present(&self.pid_dir(pid).join("cmdline"))
    }
}

impl DescriptorSource for ProcFs {
    fn list_descriptors(&self, pid: Pid) -> Result<Vec<u32>> {
        let dir = self.pid_dir(pid).join("fd");
        let entries = fs::read_dir(&dir).map_err(|source| listing_error(pid, source))?;

        let mut fds = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| listing_error(pid, source))?;
            if let Some(fd) = entry.file_name().to_str().and_then(|n| n.parse().ok()) {
                fds.push(fd);
            }
        }
        Ok(fds)
    }

    fn describe(&self, pid: Pid, fd: u32) -> Result<DescriptorInfo> {
        let resolve_err = |source| InspectError::FdResolve { pid, fd, source };
        let pid_dir = self.pid_dir(pid);

        let target = fs::read_link(pid_dir.join("fd").join(fd.to_string())).map_err(resolve_err)?;
        let fdinfo =
            fs::read_to_string(pid_dir.join("fdinfo").join(fd.to_string())).map_err(resolve_err)?;
        let flags = parse_fdinfo_flags(&fdinfo)
            .map_err(|reason| InspectError::MalformedFdInfo { pid, fd, reason })?;

        Ok(DescriptorInfo {
            number: fd,
            target: FdTarget::classify(&target),
            access: AccessMode::from_flags(flags),
        })
    }

    /// A zombie keeps its `stat` but has already dropped its fd table, so
    /// it counts as gone.
    fn is_alive(&self, pid: Pid) -> bool {
        match self.stat(pid) {
            Ok(Some(stat)) => !stat.is_exited(),
            _ => false,
        }
    }
}

fn listing_error(pid: Pid, source: io::Error) -> InspectError {
    if source.kind() == io::ErrorKind::PermissionDenied {
        InspectError::PermissionDenied { pid }
    } else {
        InspectError::ProcessVanished { pid, source }
    }
}

/// Reads a procfs file, mapping "process gone" errors to `None`.
fn read_if_present(path: &Path) -> Result<Option<String>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        // ESRCH shows up when the task exits while the file is open
        Err(e) if e.kind() == io::ErrorKind::NotFound || e.raw_os_error() == Some(libc::ESRCH) => {
            Ok(None)
        }
        Err(source) => Err(InspectError::ProcScan {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// The fields of `/proc/<pid>/stat` this crate uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    /// Kernel task name, at most 15 bytes.
    pub comm: String,
    /// Single-letter task state, e.g. `S` or `Z`.
    pub state: char,
    pub ppid: Pid,
}

impl Stat {
    /// Zombie or dead: the task has exited even if it hasn't been reaped.
    pub fn is_exited(&self) -> bool {
        matches!(self.state, 'Z' | 'X' | 'x')
    }
}

/// Parses `/proc/<pid>/stat`.
///
/// `comm` sits between the first `(` and the *last* `)`, because the name
/// itself may contain spaces and parentheses.
///
/// # Examples
///
/// ```
/// use inspect_fds::platform::linux::parse_stat;
///
/// let stat = parse_stat("1234 (tmux: server) S 1 1234 1234 0 -1 4194560").unwrap();
/// assert_eq!(stat.comm, "tmux: server");
/// assert_eq!(stat.state, 'S');
/// assert_eq!(stat.ppid, 1);
/// ```
pub fn parse_stat(content: &str) -> Option<Stat> {
    let open = content.find('(')?;
    let close = content.rfind(')')?;
    let comm = content.get(open + 1..close)?.to_string();

    let mut rest = content.get(close + 1..)?.split_whitespace();
    let state = rest.next()?.chars().next()?;
    let ppid = rest.next()?.parse().ok()?;
    Some(Stat { comm, state, ppid })
}

/// Extracts the real uid from `/proc/<pid>/status`.
pub fn parse_status_uid(content: &str) -> Option<u32> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("Uid:"))?
        .split_whitespace()
        .next()?
        .parse()
        .ok()
}

/// First word of a NUL-separated command line, the way `ps -o cmd=` would
/// print it. Falls back to `[comm]` when the command line is empty.
pub fn display_name(cmdline: &str, comm: &str) -> String {
    cmdline
        .split(|c: char| c == '\0' || c.is_whitespace())
        .find(|word| !word.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("[{comm}]"))
}

/// [`ProcessDirectory`] that reads procfs directly.
#[derive(Debug, Clone)]
pub struct ProcfsDirectory {
    procfs: ProcFs,
    self_pid: Pid,
}

impl ProcfsDirectory {
    pub fn new(procfs: ProcFs) -> Self {
        Self {
            procfs,
            self_pid: std::process::id(),
        }
    }

    /// `stat` for a pid met during a scan; unreadable entries are skipped.
    fn scanned_stat(&self, pid: Pid) -> Option<Stat> {
        match self.procfs.stat(pid) {
            Ok(stat) => stat,
            Err(err) => {
                debug!("procfs: skipping PID {pid}: {err}");
                None
            }
        }
    }
}

impl ProcessDirectory for ProcfsDirectory {
    fn by_id(&self, pid: Pid) -> Result<Option<ProcessEntry>> {
        let Some(stat) = self.procfs.stat(pid)? else {
            return Ok(None);
        };
        let cmdline = self.procfs.cmdline(pid)?.unwrap_or_default();

        Ok(Some(ProcessEntry {
            pid,
            ppid: stat.ppid,
            name: display_name(&cmdline, &stat.comm),
        }))
    }

    fn by_parent_id(&self, ppid: Pid) -> Result<Vec<Pid>> {
        let mut children = Vec::new();
        for pid in self.procfs.pids()? {
            if let Some(stat) = self.scanned_stat(pid) {
                if stat.ppid == ppid {
                    children.push(pid);
                }
            }
        }
        Ok(children)
    }

    fn by_owner_and_name(&self, uid: u32, pattern: &str) -> Result<Vec<Pid>> {
        let mut matches = Vec::new();
        for pid in self.procfs.pids()? {
            if pid == self.self_pid {
                continue;
            }
            let Some(stat) = self.scanned_stat(pid) else {
                continue;
            };
            if !stat.comm.contains(pattern) {
                continue;
            }
            if self.procfs.uid(pid).ok().flatten() == Some(uid) {
                matches.push(pid);
            }
        }
        debug!("procfs: {} process(es) named like {pattern:?}", matches.len());
        Ok(matches)
    }
}
