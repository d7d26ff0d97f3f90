//! Platform-specific implementations of fd and process inspection.
//!
//! Only Linux is supported: the fd table is read from procfs, which has no
//! direct equivalent elsewhere.

#[cfg(target_os = "linux")]
pub mod linux;
