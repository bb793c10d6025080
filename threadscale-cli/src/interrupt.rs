//! Operator Interrupts
//!
//! A SIGINT during a session must not lose the rows collected so far. The
//! handler only raises a flag; the launcher's wait loop and the orchestrator
//! poll it and unwind normally, flushing the report on the way out.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

static SIGINT_RECEIVED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigint(_signal: libc::c_int) {
    SIGINT_RECEIVED.store(true, Ordering::SeqCst);
}

/// Cancellation flag shared by the launcher and the orchestrator
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
    watch_signals: bool,
}

impl Interrupt {
    /// Flag that is only raised by [`Interrupt::trigger`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag that is also raised by SIGINT. SIGQUIT is ignored so that a
    /// stray quit from the terminal does not kill the session outright.
    pub fn from_signals() -> std::io::Result<Self> {
        unsafe {
            let handler = on_sigint as extern "C" fn(libc::c_int) as libc::sighandler_t;
            if libc::signal(libc::SIGINT, handler) == libc::SIG_ERR {
                return Err(std::io::Error::last_os_error());
            }
            if libc::signal(libc::SIGQUIT, libc::SIG_IGN) == libc::SIG_ERR {
                return Err(std::io::Error::last_os_error());
            }
        }
        Ok(Self {
            flag: Arc::new(AtomicBool::new(false)),
            watch_signals: true,
        })
    }

    /// Raise the flag
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether the session should stop
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
            || (self.watch_signals && SIGINT_RECEIVED.load(Ordering::SeqCst))
    }
}
