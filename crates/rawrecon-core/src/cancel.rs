//! Process-wide cancellation flag for external interrupts, driving
//! `Error::Interrupted` and the "Process stopped" path.
//!
//! A single `Ctrl-C` handler, installed once by the CLI, flips one atomic
//! flag; every suspension point the Probe Engine owns (inter-probe delay,
//! the quiescence window) polls it in short slices so the engine can abort
//! within the same 1 ms bound the capture thread already uses to notice
//! `stop()`, rather than riding out a multi-second sleep first.

use std::sync::atomic::{AtomicBool, Ordering};

static CANCELLED: AtomicBool = AtomicBool::new(false);

/// Install the `SIGINT`/`Ctrl-C` handler. Idempotent to call more than once
/// in the same process is *not* guaranteed by the underlying crate, so the
/// caller (the CLI's `main`) must call this exactly once at startup.
pub fn install_handler() -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(|| CANCELLED.store(true, Ordering::SeqCst))
}

/// Whether an interrupt has been observed since the process started (or
/// since the last [`reset`]).
pub fn is_cancelled() -> bool {
    CANCELLED.load(Ordering::SeqCst)
}

/// Clear the flag. Only meaningful in tests: a real process exits once it
/// observes cancellation, so production code never needs to un-cancel.
pub fn reset() {
    CANCELLED.store(false, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uncancelled() {
        reset();
        assert!(!is_cancelled());
    }

    #[test]
    fn reset_clears_a_simulated_cancellation() {
        CANCELLED.store(true, Ordering::SeqCst);
        assert!(is_cancelled());
        reset();
        assert!(!is_cancelled());
    }
}
