//! In-memory process table for unit tests.

use std::cell::Cell;
use std::collections::{BTreeMap, HashSet};
use std::io;

use crate::descriptor::{AccessMode, DescriptorInfo, DescriptorSource, FdTarget};
use crate::directory::{ProcessDirectory, ProcessEntry};
use crate::error::{InspectError, Result};
use crate::Pid;

enum FakeFd {
    Open(FdTarget, AccessMode),
    Malformed,
}

#[derive(Default)]
pub struct FakeSystem {
    processes: BTreeMap<Pid, (ProcessEntry, u32)>,
    fds: BTreeMap<Pid, BTreeMap<u32, FakeFd>>,
    vanished: HashSet<Pid>,
    denied: HashSet<Pid>,
    exits_while_described: HashSet<Pid>,
    exited: Cell<Option<Pid>>,
}

impl FakeSystem {
    pub fn add_process(&mut self, pid: Pid, ppid: Pid, name: &str, uid: u32) {
        let entry = ProcessEntry {
            pid,
            ppid,
            name: name.to_string(),
        };
        self.processes.insert(pid, (entry, uid));
        self.fds.entry(pid).or_default();
    }

    pub fn add_fd(&mut self, pid: Pid, fd: u32, target: FdTarget, access: AccessMode) {
        self.fds
            .entry(pid)
            .or_default()
            .insert(fd, FakeFd::Open(target, access));
    }

    pub fn add_malformed_fd(&mut self, pid: Pid, fd: u32) {
        self.fds.entry(pid).or_default().insert(fd, FakeFd::Malformed);
    }

    /// Listing the fd table of `pid` fails as if it had exited.
    pub fn vanish(&mut self, pid: Pid) {
        self.vanished.insert(pid);
    }

    pub fn deny(&mut self, pid: Pid) {
        self.denied.insert(pid);
    }

    /// `pid` lists fine but exits before its first descriptor is described.
    pub fn exit_while_described(&mut self, pid: Pid) {
        self.exits_while_described.insert(pid);
    }
}

impl ProcessDirectory for FakeSystem {
    fn by_id(&self, pid: Pid) -> Result<Option<ProcessEntry>> {
        Ok(self.processes.get(&pid).map(|(entry, _)| entry.clone()))
    }

    fn by_parent_id(&self, ppid: Pid) -> Result<Vec<Pid>> {
        Ok(self
            .processes
            .values()
            .filter(|(entry, _)| entry.ppid == ppid)
            .map(|(entry, _)| entry.pid)
            .collect())
    }

    fn by_owner_and_name(&self, uid: u32, pattern: &str) -> Result<Vec<Pid>> {
        Ok(self
            .processes
            .values()
            .filter(|(entry, owner)| *owner == uid && entry.name.contains(pattern))
            .map(|(entry, _)| entry.pid)
            .collect())
    }
}

impl DescriptorSource for FakeSystem {
    fn list_descriptors(&self, pid: Pid) -> Result<Vec<u32>> {
        if self.denied.contains(&pid) {
            return Err(InspectError::PermissionDenied { pid });
        }
        if self.vanished.contains(&pid) {
            return Err(InspectError::ProcessVanished {
                pid,
                source: io::Error::from(io::ErrorKind::NotFound),
            });
        }
        // reverse order, like a directory listing that isn't sorted
        Ok(self
            .fds
            .get(&pid)
            .map(|table| table.keys().rev().copied().collect())
            .unwrap_or_default())
    }

    fn describe(&self, pid: Pid, fd: u32) -> Result<DescriptorInfo> {
        if self.exits_while_described.contains(&pid) {
            self.exited.set(Some(pid));
        }
        if self.exited.get() == Some(pid) {
            return Err(InspectError::FdResolve {
                pid,
                fd,
                source: io::Error::from(io::ErrorKind::NotFound),
            });
        }
        match self.fds.get(&pid).and_then(|table| table.get(&fd)) {
            Some(FakeFd::Open(target, access)) => Ok(DescriptorInfo {
                number: fd,
                target: target.clone(),
                access: *access,
            }),
            Some(FakeFd::Malformed) => Err(InspectError::MalformedFdInfo {
                pid,
                fd,
                reason: "no flags field".to_string(),
            }),
            None => Err(InspectError::FdResolve {
                pid,
                fd,
                source: io::Error::from(io::ErrorKind::NotFound),
            }),
        }
    }

    fn is_alive(&self, pid: Pid) -> bool {
        self.processes.contains_key(&pid)
            && !self.vanished.contains(&pid)
            && self.exited.get() != Some(pid)
    }
}
