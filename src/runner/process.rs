//! Subprocess spawning and stdout helpers.
//! Internal to `runner`; the public surface is re-exported from `mod.rs`.

use std::io::{self, Write};
use std::process::{Command, ExitStatus};

use tracing::info;

/// Split a synthesised command line and run it, inheriting the standard
/// streams, blocking until the child exits.
///
/// # Errors
///
/// Returns an [`io::Error`] when the command text cannot be split, the
/// process fails to spawn, or it exits nonzero.
pub fn run_command(command: &str) -> io::Result<()> {
    let argv = shlex::split(command).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("unparseable command: {command}"),
        )
    })?;
    let Some((program, args)) = argv.split_first() else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "empty command",
        ));
    };
    info!("Running command: {command}");
    let status = Command::new(program).args(args).status()?;
    check_exit_status(status, program)
}

fn check_exit_status(status: ExitStatus, program: &str) -> io::Result<()> {
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("{program} exited with {status}")))
    }
}

fn is_broken_pipe(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::BrokenPipe
}

/// Write `text` to stdout, treating a closed pipe as success so piping
/// into `head` and friends stays quiet.
///
/// # Errors
///
/// Returns an [`io::Error`] for failures other than a broken pipe.
pub fn write_stdout(text: &str) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    match stdout.write_all(text.as_bytes()) {
        Ok(()) => {}
        Err(err) if is_broken_pipe(&err) => return Ok(()),
        Err(err) => return Err(err),
    }
    match stdout.flush() {
        Ok(()) => Ok(()),
        Err(err) if is_broken_pipe(&err) => Ok(()),
        Err(err) => Err(err),
    }
}
