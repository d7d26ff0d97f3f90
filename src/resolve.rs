//! Turning the command-line argument into a pid.

use log::debug;

use crate::directory::ProcessDirectory;
use crate::error::{InspectError, Result};
use crate::Pid;

/// Resolves `arg` to exactly one live process.
///
/// A program name owned by `uid` is tried first. When nothing matches, `arg`
/// is taken as a pid and checked for existence. When several programs match,
/// a live pid spelled by `arg` still wins; otherwise the candidates are
/// reported.
///
/// # Errors
///
/// [`InspectError::UnresolvableTarget`] when `arg` is neither a matching name
/// nor a live pid, [`InspectError::AmbiguousName`] when the name is shared.
pub fn resolve_target(directory: &dyn ProcessDirectory, uid: u32, arg: &str) -> Result<Pid> {
    let matches = directory.by_owner_and_name(uid, arg)?;
    debug!("name search for {arg:?} (uid {uid}) found {matches:?}");

    if let [pid] = matches[..] {
        return Ok(pid);
    }
    if !matches.is_empty() {
        if let Some(pid) = live_pid(directory, arg)? {
            return Ok(pid);
        }
        return Err(InspectError::AmbiguousName {
            name: arg.to_string(),
            pids: matches,
        });
    }

    live_pid(directory, arg)?.ok_or_else(|| InspectError::UnresolvableTarget(arg.to_string()))
}

fn live_pid(directory: &dyn ProcessDirectory, arg: &str) -> Result<Option<Pid>> {
    let Ok(pid) = arg.parse::<Pid>() else {
        return Ok(None);
    };
    Ok(directory.by_id(pid)?.map(|entry| entry.pid))
}
