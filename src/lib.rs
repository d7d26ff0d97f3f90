//! `inspect-fds` — show which files, terminals and pipes a process holds open.
//!
//! The library resolves a program name or pid to a process, reads its fd
//! table and that of its direct children, and prints one table per process.
//! See [`report::Report`] for the output and [`platform::linux`] for the
//! procfs backend.

pub mod config;
pub mod descriptor;
pub mod directory;
pub mod error;
pub mod palette;
pub mod platform;
pub mod report;
pub mod resolve;

#[cfg(test)]
mod testing;

pub use error::InspectError;

/// Operating-system process id.
pub type Pid = u32;
