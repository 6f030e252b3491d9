//! Pod keep-alive entrypoint.
//!
//! A step pod starts with this process as PID 1. It blocks until the client
//! writes the signal message on stdin, then execs the real command so the
//! step's output goes to an attached client.

use std::env;
use std::ffi::CString;
use std::io::{self, BufRead};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail, ensure};
use tracing::{debug, info};

use crate::cli::InitArgs;

/// The signal line must not fit in a 16 byte read together with its newline.
pub const MIN_SIGNAL_MESSAGE_LEN: usize = 15;

pub fn run(args: InitArgs) -> Result<()> {
    let program = args.command.first().context("no command given")?;
    let executable = resolve_executable(program, env::var_os("PATH").as_deref())
        .with_context(|| format!("could not resolve executable {program:?}"))?;

    if !args.skip_waiting {
        ensure!(
            args.signal_message.len() >= MIN_SIGNAL_MESSAGE_LEN,
            "signal message too short: {} bytes given, minimum is {MIN_SIGNAL_MESSAGE_LEN}",
            args.signal_message.len()
        );

        spawn_waiting_log(args.signal_message.clone(), args.interval);
        wait_for_signal(io::stdin().lock(), &args.signal_message)
            .context("error reading stdin")?;
        debug!(command = ?args.command, "runtime attached, executing step");
    }

    exec(&executable, &args.command)
}

fn spawn_waiting_log(expected: String, interval: Duration) {
    thread::spawn(move || {
        loop {
            info!(expected_message = %expected, "waiting for attach");
            thread::sleep(interval);
        }
    });
}

/// Block until a line equal to `expected` is read.
///
/// Other lines are skipped. End of input before the signal is an error.
pub fn wait_for_signal<R: BufRead>(mut reader: R, expected: &str) -> io::Result<()> {
    let mut line = Vec::with_capacity(expected.len() + 1);
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stdin closed before the client attached",
            ));
        }
        let trimmed = line
            .strip_suffix(b"\n")
            .map(|l| l.strip_suffix(b"\r").unwrap_or(l))
            .unwrap_or(&line[..]);
        if trimmed == expected.as_bytes() {
            return Ok(());
        }
        debug!(length = trimmed.len(), "unexpected line received");
    }
}

/// Find `program` the way a shell would: paths containing `/` are taken as
/// is, bare names are searched for in `path_var`.
pub fn resolve_executable(program: &str, path_var: Option<&std::ffi::OsStr>) -> Result<PathBuf> {
    if program.contains('/') {
        let path = PathBuf::from(program);
        ensure!(is_executable(&path), "{program} is not an executable file");
        return Ok(path);
    }

    let search = path_var.context("PATH is not set")?;
    env::split_paths(search)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
        .context("executable file not found in PATH")
}

fn is_executable(path: &Path) -> bool {
    path.metadata()
        .is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

fn exec(executable: &Path, argv: &[String]) -> Result<()> {
    let path = CString::new(executable.as_os_str().as_encoded_bytes())
        .context("executable path contains a NUL byte")?;
    let argv = argv
        .iter()
        .map(|a| CString::new(a.as_str()))
        .collect::<Result<Vec<_>, _>>()
        .context("argument contains a NUL byte")?;

    match nix::unistd::execv(&path, &argv) {
        Ok(never) => match never {},
        Err(errno) => bail!("exec failed: {errno}"),
    }
}
