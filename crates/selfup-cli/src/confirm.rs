use std::io::Write;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::render::{OutputStyle, TerminalRenderer};

/// Gate between the preflight checks and the first destructive step.
pub(crate) trait Confirmation {
    fn confirm(&self) -> Result<()>;
}

impl<F> Confirmation for F
where
    F: Fn() -> Result<()>,
{
    fn confirm(&self) -> Result<()> {
        self()
    }
}

/// Announces what the update touches and waits out a countdown. Interrupting
/// the process during the countdown leaves the installation untouched.
pub(crate) struct CountdownConfirmation {
    seconds: u64,
    renderer: TerminalRenderer,
}

impl CountdownConfirmation {
    pub(crate) fn new(seconds: u64, renderer: TerminalRenderer) -> Self {
        Self { seconds, renderer }
    }
}

impl Confirmation for CountdownConfirmation {
    fn confirm(&self) -> Result<()> {
        self.renderer.print_status(
            "warn",
            "the update overwrites existing files except configuration and saved data",
        );
        self.renderer
            .print_status("info", "a backup of the preserved data is created first");
        self.renderer
            .print_status("warn", "press Ctrl+C before the countdown ends to cancel");

        let mut stdout = std::io::stdout();
        for remaining in (1..=self.seconds).rev() {
            match self.renderer.style() {
                OutputStyle::Rich => {
                    write!(stdout, "\r{:<40}", countdown_message(remaining))
                        .context("failed writing countdown")?;
                    stdout.flush().context("failed flushing countdown")?;
                }
                OutputStyle::Plain => println!("{}", countdown_message(remaining)),
            }
            thread::sleep(Duration::from_secs(1));
        }
        if self.renderer.style() == OutputStyle::Rich && self.seconds > 0 {
            writeln!(stdout, "\r{:<40}", "").context("failed clearing countdown")?;
        }

        self.renderer.print_status("ok", "proceeding with the update");
        Ok(())
    }
}

pub(crate) fn countdown_message(remaining: u64) -> String {
    match remaining {
        1 => "starting in 1 second...".to_string(),
        n => format!("starting in {n} seconds..."),
    }
}
