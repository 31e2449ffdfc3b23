use std::process;
use std::sync::atomic::{AtomicU8, Ordering};

use anyhow::{Context, Result};
use selfup_core::UpdateError;

use crate::render::TerminalRenderer;

const OPEN: u8 = 0;
const HELD: u8 = 1;
const ABORTING: u8 = 2;

/// Decides what an interrupt signal does. While open, an interrupt aborts the
/// process; once held, interrupts are ignored until the gate is released.
pub(crate) struct InterruptGate {
    state: AtomicU8,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum InterruptAction {
    Abort,
    Ignore,
}

impl InterruptGate {
    pub(crate) const fn new() -> Self {
        Self {
            state: AtomicU8::new(OPEN),
        }
    }

    /// Records an interrupt and returns what the handler should do.
    pub(crate) fn interrupt(&self) -> InterruptAction {
        match self
            .state
            .compare_exchange(OPEN, ABORTING, Ordering::SeqCst, Ordering::SeqCst)
        {
            Err(HELD) => InterruptAction::Ignore,
            _ => InterruptAction::Abort,
        }
    }

    /// Closes the gate before the first destructive step. Fails when an
    /// interrupt already won the race.
    pub(crate) fn hold(&self) -> Result<(), UpdateError> {
        match self
            .state
            .compare_exchange(OPEN, HELD, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) | Err(HELD) => Ok(()),
            Err(_) => Err(UpdateError::Aborted(
                "interrupted before the first destructive step".to_string(),
            )),
        }
    }

    pub(crate) fn release(&self) {
        let _ = self
            .state
            .compare_exchange(HELD, OPEN, Ordering::SeqCst, Ordering::SeqCst);
    }

    pub(crate) fn is_held(&self) -> bool {
        self.state.load(Ordering::SeqCst) == HELD
    }
}

/// Routes SIGINT and SIGTERM (Ctrl+C and Ctrl+Break on Windows) through `gate`.
pub(crate) fn install_handler(
    gate: &'static InterruptGate,
    renderer: TerminalRenderer,
) -> Result<()> {
    ctrlc::set_handler(move || match gate.interrupt() {
        InterruptAction::Abort => {
            tracing::info!("interrupted before any change, aborting");
            renderer.print_status("error", "interrupted; the installation was not modified");
            process::exit(1);
        }
        InterruptAction::Ignore => {
            tracing::warn!("interrupt ignored while the update is modifying files");
            renderer.print_status(
                "warn",
                "the update is modifying files and cannot be cancelled now; wait for it to finish",
            );
        }
    })
    .context("failed installing interrupt handler")
}
