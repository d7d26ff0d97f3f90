//! `inspect-fds` — show the open file descriptors of a process and its
//! children.
//!
//! `inspect-fds <PID or NAME>` prints one table per process: the target
//! first, then each direct child. Both ends of a pipe share a color so
//! readers and writers can be matched across processes.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use clap::error::ErrorKind;
use clap::Parser;
use log::{info, warn};
use owo_colors::OwoColorize;

use inspect_fds::config::{ColorMode, Config};
use inspect_fds::directory::Backend;
use inspect_fds::InspectError;

#[derive(Parser)]
#[command(name = "inspect-fds", version)]
#[command(about = "Show the open file descriptors of a process and its children")]
struct Cli {
    /// PID or name of a running program.
    target: String,

    /// Disable colored output.
    #[arg(long = "no-color")]
    no_color: bool,

    /// Where process names, parents and children come from.
    #[arg(long, value_enum)]
    backend: Option<Backend>,

    /// Mount point of procfs.
    #[arg(long, value_name = "PATH")]
    proc_root: Option<PathBuf>,

    /// Config file to use instead of ~/.config/inspect-fds/config.toml.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log debug output to stderr.
    #[arg(short, long)]
    verbose: bool,

    /// Log filter, e.g. `info` or `inspect_fds=debug`.
    #[arg(long, value_name = "FILTER", conflicts_with = "verbose")]
    log_level: Option<String>,
}

fn setup_logging(cli: &Cli) {
    if cli.verbose {
        env_logger::Builder::new().parse_filters("debug").init();
        return;
    }

    if let Some(level) = &cli.log_level {
        env_logger::Builder::new().parse_filters(level).init();
        return;
    }

    // default
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
}

/// Loads the config. An explicit `--config` must be readable; problems with
/// the default file only produce a warning.
fn load_config(cli: &Cli) -> Result<Config, InspectError> {
    if let Some(path) = &cli.config {
        return Config::load_from(path);
    }

    Ok(Config::load().unwrap_or_else(|e| {
        warn!("{e}; using defaults");
        Config::default()
    }))
}

/// Prints `err` in red on stderr and exits with status 1.
fn fail(err: impl std::fmt::Display) -> ! {
    eprintln!(
        "{}",
        err.to_string()
            .if_supports_color(owo_colors::Stream::Stderr, |s| s.red())
    );
    process::exit(1);
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            let _ = e.print();
            process::exit(1);
        }
    };

    setup_logging(&cli);

    let config = load_config(&cli).unwrap_or_else(|e| fail(e));

    let color = if cli.no_color {
        ColorMode::Never
    } else {
        config.display.color
    };
    color.apply();

    match cmd_inspect(&cli, &config) {
        Ok(()) => {}
        // the reader went away, e.g. `inspect-fds sh | head`
        Err(InspectError::Output(e)) if e.kind() == io::ErrorKind::BrokenPipe => {}
        Err(e) => fail(e),
    }
}

/// Resolves the target and prints its fd table and its children's.
#[cfg(target_os = "linux")]
fn cmd_inspect(cli: &Cli, config: &Config) -> Result<(), InspectError> {
    use inspect_fds::directory::ProcessDirectory;
    use inspect_fds::platform::linux::ps::PsDirectory;
    use inspect_fds::platform::linux::{ProcFs, ProcfsDirectory};
    use inspect_fds::report::Report;
    use inspect_fds::resolve::resolve_target;

    let proc_root = cli
        .proc_root
        .clone()
        .unwrap_or_else(|| config.general.proc_root.clone());
    let procfs = ProcFs::with_root(proc_root);

    let backend = cli.backend.unwrap_or(config.general.backend);
    let directory: Box<dyn ProcessDirectory> = match backend {
        Backend::Procfs => Box::new(ProcfsDirectory::new(procfs.clone())),
        Backend::Ps => Box::new(PsDirectory::new()),
    };

    let uid = nix::unistd::getuid().as_raw();
    let pid = resolve_target(directory.as_ref(), uid, &cli.target)?;
    info!("inspecting PID {pid} via {backend:?} backend");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    Report::new(directory.as_ref(), &procfs).run(&mut out, pid)?;
    out.flush()?;
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn cmd_inspect(_cli: &Cli, _config: &Config) -> Result<(), InspectError> {
    fail("fd inspection is not yet implemented for this platform");
}
