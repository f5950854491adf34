//! Cooperative shutdown flag, set from signal context.
//!
//! The flag is a single word written false-to-true at most once per
//! process life and polled by the clock loop, so a release store in the
//! handler paired with an acquire load in the loop is all the ordering
//! needed.

use std::io;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};

/// Handle over the shutdown word the loop polls each tick.
///
/// Constructible over any `'static` atomic, so tests drive the loop
/// with their own flag instead of the process-wide signal one.
#[derive(Clone, Copy)]
pub struct ShutdownFlag {
    cell: &'static AtomicBool,
}

impl ShutdownFlag {
    pub const fn new(cell: &'static AtomicBool) -> Self {
        ShutdownFlag { cell }
    }

    /// Request shutdown. Safe to call more than once.
    pub fn request(&self) {
        self.cell.store(true, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.cell.load(Ordering::Acquire)
    }
}

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_signal(_sig: libc::c_int) {
    // Async-signal context: a plain atomic store only.
    ShutdownFlag::new(&SHUTDOWN).request();
}

/// Install SIGINT and SIGTERM handlers that set the process shutdown
/// flag, and return the handle for the loop.
///
/// Registered without `SA_RESTART` so the tick sleep is interrupted and
/// the loop observes the flag within one tick boundary.
pub fn install() -> io::Result<ShutdownFlag> {
    let mut action: libc::sigaction = unsafe { std::mem::zeroed() };
    action.sa_sigaction = handle_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
    action.sa_flags = 0;

    // SAFETY: action is fully initialized; the handler is
    // async-signal-safe (one atomic store).
    unsafe {
        libc::sigemptyset(&mut action.sa_mask);
        for sig in [libc::SIGINT, libc::SIGTERM] {
            if libc::sigaction(sig, &action, ptr::null_mut()) == -1 {
                return Err(io::Error::last_os_error());
            }
        }
    }

    Ok(ShutdownFlag::new(&SHUTDOWN))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_starts_clear_and_latches() {
        static CELL: AtomicBool = AtomicBool::new(false);
        let flag = ShutdownFlag::new(&CELL);
        assert!(!flag.is_set());
        flag.request();
        assert!(flag.is_set());
        // Setting again is harmless.
        flag.request();
        assert!(flag.is_set());
    }
}
