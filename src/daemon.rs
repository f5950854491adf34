//! Background-process bootstrap
//!
//! Classic double-step daemonization: fork and let the parent exit,
//! then start a new session, move to the filesystem root and close the
//! standard streams. Kept outside the clock loop so the core can run
//! in the foreground of a test harness without any of this.

use std::io;
use std::process;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("fork failed")]
    Fork(#[source] io::Error),

    /// Exit status 2, per the CLI contract.
    #[error("failed to create a new session")]
    Session(#[source] io::Error),
}

/// Detach from the controlling terminal.
///
/// On return the caller is the daemonized child: session leader, cwd
/// `/`, stdin/stdout/stderr closed (log output stops here, which is the
/// point). The parent process exits 0 inside this call.
pub fn daemonize() -> Result<(), DaemonError> {
    // SAFETY: plain fork; the child continues with this thread only,
    // and nothing below allocates before the exec-free re-setup.
    match unsafe { libc::fork() } {
        -1 => return Err(DaemonError::Fork(io::Error::last_os_error())),
        0 => {}
        _child_pid => process::exit(0),
    }

    // SAFETY: valid calls in the forked child; chdir to a path that
    // always exists, and closing fds 0..2 releases the terminal.
    unsafe {
        if libc::setsid() == -1 {
            return Err(DaemonError::Session(io::Error::last_os_error()));
        }
        libc::chdir(c"/".as_ptr());
        libc::close(libc::STDIN_FILENO);
        libc::close(libc::STDOUT_FILENO);
        libc::close(libc::STDERR_FILENO);
    }

    Ok(())
}
