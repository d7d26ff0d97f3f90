//! Per-process fd tables.
//!
//! [`Report::run`] prints the target process followed by each of its direct
//! children. Each table is sorted by descriptor number. A process that
//! disappears while it is being inspected is reported with a single warning
//! and does not stop the run.

use std::io::Write;

use log::{debug, warn};
use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use crate::descriptor::{DescriptorInfo, DescriptorSource, FdTarget};
use crate::directory::ProcessDirectory;
use crate::error::{InspectError, Result};
use crate::palette::PipeColorAllocator;
use crate::Pid;

pub const VANISHED_WARNING: &str = "Warning: could not inspect file descriptors for this process! \
It might have exited just as we were about to look at its fd table, \
or it might have exited a while ago and is waiting for the parent to reap it.";

pub const DENIED_WARNING: &str = "Warning: permission denied while inspecting file descriptors \
for this process! It probably belongs to another user.";

enum Row {
    Described(DescriptorInfo),
    Skipped { fd: u32, error: InspectError },
}

enum Table {
    Rows(Vec<Row>),
    Vanished,
    Denied,
}

/// Prints fd tables for one run, keeping pipe colors consistent across every
/// process it visits.
pub struct Report<'a> {
    directory: &'a dyn ProcessDirectory,
    descriptors: &'a dyn DescriptorSource,
    colors: PipeColorAllocator,
}

impl<'a> Report<'a> {
    pub fn new(directory: &'a dyn ProcessDirectory, descriptors: &'a dyn DescriptorSource) -> Self {
        Self {
            directory,
            descriptors,
            colors: PipeColorAllocator::new(),
        }
    }

    /// Pipe colors handed out so far.
    pub fn colors(&self) -> &PipeColorAllocator {
        &self.colors
    }

    /// Prints `target`, then each direct child in the order the directory
    /// returns them.
    ///
    /// # Errors
    ///
    /// Propagates directory failures and write errors. Processes that vanish
    /// are reported inline and are not errors.
    pub fn run(&mut self, out: &mut dyn Write, target: Pid) -> Result<()> {
        self.print_process(out, target)?;

        let children = self.directory.by_parent_id(target)?;
        debug!("PID {target} has children {children:?}");

        for child in children {
            self.print_process(out, child)?;
        }
        Ok(())
    }

    /// Prints the header and fd table of a single process.
    pub fn print_process(&mut self, out: &mut dyn Write, pid: Pid) -> Result<()> {
        let entry = match self.directory.by_id(pid) {
            Ok(entry) => entry,
            Err(err) => {
                warn!("{err}");
                None
            }
        };
        let (name, ppid) = match &entry {
            Some(e) => (e.name.clone(), e.ppid.to_string()),
            None => ("?".to_string(), "?".to_string()),
        };
        writeln!(out, "========== {name} (pid {pid}, ppid {ppid}) ==========")?;

        match self.collect(pid)? {
            Table::Vanished => writeln!(out, "{VANISHED_WARNING}")?,
            Table::Denied => writeln!(out, "{DENIED_WARNING}")?,
            Table::Rows(rows) => {
                for row in rows {
                    self.print_row(out, row)?;
                }
            }
        }
        Ok(())
    }

    fn collect(&self, pid: Pid) -> Result<Table> {
        let mut fds = match self.descriptors.list_descriptors(pid) {
            Ok(fds) => fds,
            Err(err @ InspectError::ProcessVanished { .. }) => {
                debug!("{err}");
                return Ok(Table::Vanished);
            }
            Err(InspectError::PermissionDenied { .. }) => return Ok(Table::Denied),
            Err(err) => return Err(err),
        };
        fds.sort_unstable();

        let mut rows = Vec::with_capacity(fds.len());
        for fd in fds {
            match self.descriptors.describe(pid, fd) {
                Ok(info) => rows.push(Row::Described(info)),
                Err(err) if !self.descriptors.is_alive(pid) => {
                    debug!("PID {pid} exited during inspection: {err}");
                    return Ok(Table::Vanished);
                }
                Err(error) => {
                    warn!("skipping fd {fd} of PID {pid}: {error}");
                    rows.push(Row::Skipped { fd, error });
                }
            }
        }
        Ok(Table::Rows(rows))
    }

    fn print_row(&mut self, out: &mut dyn Write, row: Row) -> Result<()> {
        match row {
            Row::Described(info) => {
                let name = match info.target {
                    FdTarget::Pipe { inode } => {
                        let color = self.colors.color_for(inode).ansi();
                        info.target
                            .to_string()
                            .if_supports_color(Stdout, |s| s.color(color))
                            .to_string()
                    }
                    ref other => other.to_string(),
                };
                writeln!(out, "{:<4}{:<18}{}", info.number, info.access.label(), name)?;
            }
            Row::Skipped { fd, error } => {
                writeln!(out, "{fd:<4}warning: {error}")?;
            }
        }
        Ok(())
    }
}
