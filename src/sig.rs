//! SIGINT plumbing for the process supervisor.
//!
//! The handler's only job is to flip a process-wide flag; the supervisor
//! polls that flag while a foreground child runs. At the prompt and between
//! commands SIGINT is ignored, so an interrupt can only ever cancel the
//! child it was aimed at.

use anyhow::{Context, Result};
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use std::ffi::c_int;
use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// The process-wide cancellation flag set by the SIGINT handler.
///
/// The supervisor takes the flag as an explicit parameter rather than
/// reading this static directly, so tests can drive cancellation without
/// delivering a real signal.
pub fn interrupt_flag() -> &'static AtomicBool {
    &INTERRUPTED
}

extern "C" fn on_sigint(_signo: c_int) {
    // Only async-signal-safe work in the handler.
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Route SIGINT into [`interrupt_flag`] for the lifetime of a foreground child.
pub fn catch_interrupts() -> Result<()> {
    set_disposition(SigHandler::Handler(on_sigint))
}

/// Restore the idle disposition: SIGINT is ignored.
pub fn ignore_interrupts() -> Result<()> {
    set_disposition(SigHandler::SigIgn)
}

fn set_disposition(handler: SigHandler) -> Result<()> {
    let action = SigAction::new(handler, SaFlags::empty(), SigSet::empty());
    unsafe { sigaction(Signal::SIGINT, &action) }.context("sigaction(SIGINT)")?;
    Ok(())
}
