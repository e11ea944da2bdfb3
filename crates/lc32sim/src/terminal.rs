//! Terminal raw-mode toggling.
//!
//! `spec.md` §5: "The terminal must be placed in raw (no-echo, no-canon)
//! mode at startup and restored at shutdown; restoration is best-effort and
//! must not fail the shutdown path." Grounded on the `termios`/`libc` stack
//! `other_examples/manifests/twe4ked-lc3/Cargo.toml` pairs for exactly this
//! purpose; `original_source/src/main.cpp` does the equivalent with raw
//! `tcgetattr`/`tcsetattr` around `ECHO|ICANON`.

use termios::{ECHO, ICANON, TCSANOW, Termios, tcsetattr};

use lc32_core::{Logger, SimError, SimResult};

/// Restores the original terminal attributes on drop. Construction fails if
/// the terminal could not be queried or reconfigured; restoration never
/// fails the caller, it only logs.
pub struct RawModeGuard {
    original: Termios,
    logger: Logger,
}

impl RawModeGuard {
    /// Disable `ECHO` and `ICANON` on stdin's controlling terminal.
    pub fn enable(logger: Logger) -> SimResult<Self> {
        let fd = libc::STDIN_FILENO;
        let original = Termios::from_fd(fd).map_err(|e| SimError::TerminalConfig {
            reason: format!("tcgetattr failed: {e}"),
        })?;

        let mut raw = original;
        raw.c_lflag &= !(ECHO | ICANON);
        tcsetattr(fd, TCSANOW, &raw).map_err(|e| SimError::TerminalConfig {
            reason: format!("tcsetattr failed: {e}"),
        })?;

        Ok(Self { original, logger })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = tcsetattr(libc::STDIN_FILENO, TCSANOW, &self.original) {
            self.logger.warn(format!("failed to restore terminal attributes: {e}"));
        }
    }
}
