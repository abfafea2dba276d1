//! Ctrl-C handling for sync runs
//!
//! The terminal sends SIGINT to the whole foreground process group, so the
//! upload command and tidemark both receive it. tidemark records the
//! request instead of dying, lets the upload command wind down, and reports
//! the batch as cancelled. A second Ctrl-C exits immediately.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use signal_hook::consts::signal::SIGINT;
use signal_hook::flag;

/// Exit status used when a second interrupt forces termination
const FORCED_EXIT: i32 = 130;

/// Shared "the user pressed Ctrl-C" flag
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    requested: Arc<AtomicBool>,
}

impl Interrupt {
    /// A flag nothing but [`Interrupt::request`] will ever set
    pub fn new() -> Self {
        Self::default()
    }

    /// Route SIGINT into a fresh flag for the rest of the process.
    pub fn install() -> io::Result<Self> {
        let interrupt = Self::new();
        // Registration order matters: the shutdown check sees the flag as
        // it was before this signal
        flag::register_conditional_shutdown(SIGINT, FORCED_EXIT, Arc::clone(&interrupt.requested))?;
        flag::register(SIGINT, Arc::clone(&interrupt.requested))?;
        tracing::debug!("interrupt handler installed");
        Ok(interrupt)
    }

    #[cfg(test)]
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}
