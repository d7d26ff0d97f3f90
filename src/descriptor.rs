//! Descriptor records and the pure rules that classify them.
//!
//! A [`DescriptorInfo`] is built from two separate procfs channels: the
//! `fd/<n>` symlink gives the target, the `fdinfo/<n>` file gives the open
//! flags. Both are interpreted here so that every platform backend and every
//! test shares one classification.

use std::fmt;
use std::path::Path;

use crate::error::Result;
use crate::Pid;

const O_WRONLY: u32 = libc::O_WRONLY as u32;
const O_RDWR: u32 = libc::O_RDWR as u32;

/// What an open descriptor points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FdTarget {
    /// A pseudo-terminal under `/dev/pts/`.
    Terminal,
    /// An anonymous pipe, identified by the inode both ends share.
    Pipe { inode: u64 },
    /// Anything else, shown by the last component of its path.
    Other { name: String },
}

impl FdTarget {
    /// Classifies the target of an `fd/<n>` symlink.
    ///
    /// # Examples
    ///
    /// ```
    /// use inspect_fds::descriptor::FdTarget;
    /// use std::path::Path;
    ///
    /// assert_eq!(FdTarget::classify(Path::new("/dev/pts/3")), FdTarget::Terminal);
    /// assert_eq!(
    ///     FdTarget::classify(Path::new("pipe:[48213]")),
    ///     FdTarget::Pipe { inode: 48213 }
    /// );
    /// assert_eq!(
    ///     FdTarget::classify(Path::new("/var/log/syslog")),
    ///     FdTarget::Other { name: "syslog".to_string() }
    /// );
    /// ```
    pub fn classify(target: &Path) -> Self {
        let text = target.to_string_lossy();

        if text.starts_with("/dev/pts/") {
            return Self::Terminal;
        }

        if let Some(inode) = pipe_inode(&text) {
            return Self::Pipe { inode };
        }

        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| text.into_owned());
        Self::Other { name }
    }
}

impl fmt::Display for FdTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminal => f.write_str("<terminal>"),
            Self::Pipe { inode } => write!(f, "<pipe #{inode}>"),
            Self::Other { name } => f.write_str(name),
        }
    }
}

/// Extracts the inode from the kernel's `pipe:[<inode>]` link text.
fn pipe_inode(text: &str) -> Option<u64> {
    text.strip_prefix("pipe:[")?
        .strip_suffix(']')?
        .parse()
        .ok()
}

/// How a descriptor was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
    ReadWrite,
}

impl AccessMode {
    /// Derives the access mode from raw `open(2)` flags.
    ///
    /// The `O_RDWR` bit is tested after `O_WRONLY`, so it wins whenever
    /// both are present.
    ///
    /// # Examples
    ///
    /// ```
    /// use inspect_fds::descriptor::AccessMode;
    ///
    /// assert_eq!(AccessMode::from_flags(0o100000), AccessMode::Read);
    /// assert_eq!(AccessMode::from_flags(0o2001), AccessMode::Write);
    /// assert_eq!(AccessMode::from_flags(0o2), AccessMode::ReadWrite);
    /// assert_eq!(AccessMode::from_flags(0o3), AccessMode::ReadWrite);
    /// ```
    pub fn from_flags(flags: u32) -> Self {
        let mut mode = Self::Read;
        if flags & O_WRONLY != 0 {
            mode = Self::Write;
        }
        if flags & O_RDWR != 0 {
            mode = Self::ReadWrite;
        }
        mode
    }

    /// Label printed in the access column.
    pub fn label(self) -> &'static str {
        match self {
            Self::Read => "(read)",
            Self::Write => "(write)",
            Self::ReadWrite => "(read/write)",
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One row of a process's fd table at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorInfo {
    /// The descriptor number (`0` for stdin).
    pub number: u32,
    /// What the descriptor points at.
    pub target: FdTarget,
    /// How it was opened.
    pub access: AccessMode,
}

/// Parses the octal `flags:` field out of an fdinfo file.
///
/// Returns a human-readable reason when the field is missing or malformed.
///
/// # Examples
///
/// ```
/// use inspect_fds::descriptor::parse_fdinfo_flags;
///
/// let fdinfo = "pos:\t0\nflags:\t02100002\nmnt_id:\t25\nino:\t7\n";
/// assert_eq!(parse_fdinfo_flags(fdinfo), Ok(0o2100002));
/// assert!(parse_fdinfo_flags("pos:\t0\n").is_err());
/// ```
pub fn parse_fdinfo_flags(content: &str) -> std::result::Result<u32, String> {
    let value = content
        .lines()
        .find_map(|line| line.strip_prefix("flags:"))
        .map(str::trim)
        .ok_or_else(|| "no flags field".to_string())?;

    u32::from_str_radix(value, 8).map_err(|e| format!("invalid octal flags {value:?}: {e}"))
}

/// Source of fd tables and descriptor details for live processes.
///
/// Implemented by [`crate::platform::linux::ProcFs`]; tests substitute
/// in-memory tables.
pub trait DescriptorSource {
    /// Lists the descriptor numbers currently open in `pid`, in no
    /// particular order.
    ///
    /// # Errors
    ///
    /// [`crate::InspectError::ProcessVanished`] or
    /// [`crate::InspectError::PermissionDenied`] when the table cannot be read.
    fn list_descriptors(&self, pid: Pid) -> Result<Vec<u32>>;

    /// Resolves the target and access mode of one descriptor.
    fn describe(&self, pid: Pid, fd: u32) -> Result<DescriptorInfo>;

    /// Whether `pid` still exists.
    fn is_alive(&self, pid: Pid) -> bool;
}
