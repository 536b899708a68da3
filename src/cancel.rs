//! Cooperative cancellation for measurements
//!
//! The executor checks the token before every repetition and kills the
//! running child when it trips. The binary wires SIGINT to a token so Ctrl-C
//! aborts a `--repeat` series instead of recording the remaining runs.

use anyhow::{Context, Result};
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Shared flag signalling "stop measuring"
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

static INTERRUPT_FLAG: OnceLock<Arc<AtomicBool>> = OnceLock::new();

extern "C" fn handle_interrupt(_signal: libc::c_int) {
    // only an atomic load and store: async-signal-safe
    if let Some(flag) = INTERRUPT_FLAG.get() {
        flag.store(true, Ordering::SeqCst);
    }
}

/// Install a SIGINT handler and return the token it trips
///
/// Calling this more than once returns tokens sharing the same flag.
pub fn interrupt_token() -> Result<CancelToken> {
    let flag = INTERRUPT_FLAG
        .get_or_init(|| Arc::new(AtomicBool::new(false)))
        .clone();

    let action = SigAction::new(
        SigHandler::Handler(handle_interrupt),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    // SAFETY: the handler only touches an already-initialized atomic
    unsafe { signal::sigaction(Signal::SIGINT, &action) }
        .context("Failed to install SIGINT handler")?;

    Ok(CancelToken { flag })
}
