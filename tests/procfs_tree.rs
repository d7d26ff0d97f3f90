//! Runs the procfs backend against a fake `/proc` built in a temp dir.

#![cfg(target_os = "linux")]

use std::fs;
use std::os::unix::fs::symlink;
use std::path::Path;

use inspect_fds::descriptor::{AccessMode, DescriptorSource, FdTarget};
use inspect_fds::directory::ProcessDirectory;
use inspect_fds::platform::linux::{ProcFs, ProcfsDirectory};
use inspect_fds::report::{Report, VANISHED_WARNING};
use inspect_fds::InspectError;
use tempfile::TempDir;

// above the kernel's pid_max, so never the test runner's own pid
const SHELL: u32 = 4_200_001;
const WRITER: u32 = 4_200_002;
const READER: u32 = 4_200_003;
const DAEMON: u32 = 4_200_010;

fn add_process(root: &Path, pid: u32, ppid: u32, comm: &str, uid: u32, cmdline: &str) {
    let dir = root.join(pid.to_string());
    fs::create_dir_all(dir.join("fd")).unwrap();
    fs::create_dir_all(dir.join("fdinfo")).unwrap();
    fs::write(
        dir.join("stat"),
        format!("{pid} ({comm}) S {ppid} {pid} {pid} 34816 {pid} 4194304 0 0"),
    )
    .unwrap();
    fs::write(
        dir.join("status"),
        format!("Name:\t{comm}\nState:\tS (sleeping)\nPPid:\t{ppid}\nUid:\t{uid}\t{uid}\t{uid}\t{uid}\n"),
    )
    .unwrap();
    fs::write(dir.join("cmdline"), cmdline).unwrap();
}

fn add_fd(root: &Path, pid: u32, fd: u32, target: &str, flags: &str) {
    let dir = root.join(pid.to_string());
    symlink(target, dir.join("fd").join(fd.to_string())).unwrap();
    fs::write(
        dir.join("fdinfo").join(fd.to_string()),
        format!("pos:\t0\nflags:\t{flags}\nmnt_id:\t15\nino:\t1\n"),
    )
    .unwrap();
}

/// A shell running `writer | reader`, plus an unrelated root daemon.
fn pipeline() -> TempDir {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();

    add_process(root, SHELL, 1, "bash", 1000, "-bash\0");
    add_fd(root, SHELL, 0, "/dev/pts/4", "0100002");
    add_fd(root, SHELL, 1, "/dev/pts/4", "0100002");
    add_fd(root, SHELL, 2, "/dev/pts/4", "0100002");
    add_fd(root, SHELL, 255, "/dev/pts/4", "02100002");

    add_process(root, WRITER, SHELL, "yes", 1000, "yes\0");
    add_fd(root, WRITER, 0, "/dev/pts/4", "0100002");
    add_fd(root, WRITER, 1, "pipe:[90001]", "01");
    add_fd(root, WRITER, 2, "/dev/pts/4", "0100002");

    add_process(root, READER, SHELL, "grep", 1000, "grep\0-v\0n\0");
    add_fd(root, READER, 0, "pipe:[90001]", "0");
    add_fd(root, READER, 1, "pipe:[90002]", "01");
    add_fd(root, READER, 2, "/dev/pts/4", "0100002");
    add_fd(root, READER, 3, "/var/log/app/grep.log", "02102001");

    add_process(root, DAEMON, 1, "bashd", 0, "/usr/sbin/bashd\0--foreground\0");

    tmp
}

#[test]
fn lists_and_describes_descriptors() {
    let tmp = pipeline();
    let procfs = ProcFs::with_root(tmp.path());

    let mut fds = procfs.list_descriptors(READER).unwrap();
    fds.sort_unstable();
    assert_eq!(fds, vec![0, 1, 2, 3]);

    let stdin = procfs.describe(READER, 0).unwrap();
    assert_eq!(stdin.target, FdTarget::Pipe { inode: 90001 });
    assert_eq!(stdin.access, AccessMode::Read);

    let log = procfs.describe(READER, 3).unwrap();
    assert_eq!(
        log.target,
        FdTarget::Other {
            name: "grep.log".to_string()
        }
    );
    assert_eq!(log.access, AccessMode::Write);

    let tty = procfs.describe(SHELL, 255).unwrap();
    assert_eq!(tty.target, FdTarget::Terminal);
    assert_eq!(tty.access, AccessMode::ReadWrite);
}

#[test]
fn missing_process_has_vanished() {
    let tmp = pipeline();
    let procfs = ProcFs::with_root(tmp.path());

    let err = procfs.list_descriptors(4_200_099).unwrap_err();
    assert!(matches!(err, InspectError::ProcessVanished { pid: 4_200_099, .. }));
    assert!(!procfs.is_alive(4_200_099));
    assert!(procfs.is_alive(SHELL));
}

#[test]
fn malformed_fdinfo_is_reported_per_descriptor() {
    let tmp = pipeline();
    let root = tmp.path();
    let dir = root.join(WRITER.to_string());
    fs::write(dir.join("fdinfo").join("2"), "pos:\t0\nmnt_id:\t15\n").unwrap();

    let procfs = ProcFs::with_root(root);
    let err = procfs.describe(WRITER, 2).unwrap_err();
    assert!(matches!(err, InspectError::MalformedFdInfo { fd: 2, .. }));
}

#[test]
fn directory_reads_names_and_parents() {
    let tmp = pipeline();
    let directory = ProcfsDirectory::new(ProcFs::with_root(tmp.path()));

    let reader = directory.by_id(READER).unwrap().unwrap();
    assert_eq!(reader.ppid, SHELL);
    assert_eq!(reader.name, "grep");

    let daemon = directory.by_id(DAEMON).unwrap().unwrap();
    assert_eq!(daemon.name, "/usr/sbin/bashd");

    assert_eq!(directory.by_id(4_200_099).unwrap(), None);
    assert_eq!(directory.by_parent_id(SHELL).unwrap(), vec![WRITER, READER]);
    assert!(directory.by_parent_id(READER).unwrap().is_empty());
}

#[test]
fn name_search_is_restricted_to_the_owner() {
    let tmp = pipeline();
    let directory = ProcfsDirectory::new(ProcFs::with_root(tmp.path()));

    assert_eq!(directory.by_owner_and_name(1000, "bash").unwrap(), vec![SHELL]);
    assert_eq!(directory.by_owner_and_name(0, "bash").unwrap(), vec![DAEMON]);
    assert!(directory.by_owner_and_name(1000, "zsh").unwrap().is_empty());
}

#[test]
fn report_covers_target_and_children() {
    let tmp = pipeline();
    let procfs = ProcFs::with_root(tmp.path());
    let directory = ProcfsDirectory::new(procfs.clone());

    let mut out = Vec::new();
    let mut report = Report::new(&directory, &procfs);
    report.run(&mut out, SHELL).unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(
        lines[0],
        format!("========== -bash (pid {SHELL}, ppid 1) ==========")
    );
    assert_eq!(lines[4].split_whitespace().next(), Some("255"));
    assert_eq!(
        lines[5],
        format!("========== yes (pid {WRITER}, ppid {SHELL}) ==========")
    );
    assert!(lines[7].starts_with("1   (write)"));
    assert!(lines[7].contains("<pipe #90001>"));
    assert_eq!(
        lines[9],
        format!("========== grep (pid {READER}, ppid {SHELL}) ==========")
    );
    assert!(lines[10].starts_with("0   (read)"));
    assert!(lines[10].contains("<pipe #90001>"));
    assert!(lines[13].ends_with("grep.log"));
    assert_eq!(lines.len(), 14);

    // 90001 and 90002
    assert_eq!(report.colors().len(), 2);
}

#[test]
fn zombie_child_is_reported_as_exited() {
    let tmp = pipeline();
    let root = tmp.path();
    let zombie = 4_200_050;
    add_process(root, zombie, SHELL, "worker", 1000, "");
    fs::write(
        root.join(zombie.to_string()).join("stat"),
        format!("{zombie} (worker) Z {SHELL} {zombie} {zombie} 0 -1 4227084 0 0"),
    )
    .unwrap();
    // listed, but the links are no longer readable
    let fd_dir = root.join(zombie.to_string()).join("fd");
    fs::write(fd_dir.join("0"), "").unwrap();
    fs::write(fd_dir.join("1"), "").unwrap();

    let procfs = ProcFs::with_root(root);
    assert!(!procfs.is_alive(zombie));

    let directory = ProcfsDirectory::new(procfs.clone());
    let mut out = Vec::new();
    Report::new(&directory, &procfs).run(&mut out, SHELL).unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    let header = lines
        .iter()
        .position(|l| l.contains(&format!("(pid {zombie}, ppid {SHELL})")))
        .expect("zombie header");
    assert_eq!(
        lines[header],
        format!("========== [worker] (pid {zombie}, ppid {SHELL}) ==========")
    );
    assert_eq!(lines[header + 1], VANISHED_WARNING);
    assert!(!text.contains("Cannot resolve fd"));
}

#[test]
fn child_that_exited_gets_a_warning() {
    let tmp = pipeline();
    fs::remove_dir_all(tmp.path().join(WRITER.to_string()).join("fd")).unwrap();

    let procfs = ProcFs::with_root(tmp.path());
    let directory = ProcfsDirectory::new(procfs.clone());
    let mut out = Vec::new();
    Report::new(&directory, &procfs).run(&mut out, SHELL).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert_eq!(text.matches(VANISHED_WARNING).count(), 1);
    assert!(text.contains(&format!("grep (pid {READER}")));
}
