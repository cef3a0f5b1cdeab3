//! Error reporting through `tracing`.
//!
//! [`ErrorReport`] renders an error and its full cause chain, one fact per
//! line. [`report_error`] hands those lines to the `tracing` subscriber, which
//! owns formatting and destinations.

use std::error::Error as StdError;
use std::fmt;

use tracing::error;

use crate::error::Error;

/// Multi-line description of an error and every underlying cause.
pub struct ErrorReport<'a> {
    error: &'a (dyn StdError + 'static),
}

impl<'a> ErrorReport<'a> {
    pub fn new(error: &'a (dyn StdError + 'static)) -> Self {
        Self { error }
    }

    /// Errors from the outermost to the innermost cause.
    pub fn chain(&self) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
        std::iter::successors(Some(self.error), |&e| e.source())
    }

    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for (depth, cause) in self.chain().enumerate() {
            if depth > 0 {
                lines.push(format!("Caused by ({}):", depth));
            }
            match cause.downcast_ref::<Error>() {
                Some(err) => {
                    lines.push(format!("{} info:", err.kind()));
                    lines.push(format!("Message: {}", err));
                    if let Some(location) = err.location() {
                        lines.push(format!("Location: {}", location));
                    }
                }
                None => {
                    lines.push("External info:".to_string());
                    lines.push(format!("Message: {}", cause));
                }
            }
        }
        lines
    }
}

impl fmt::Display for ErrorReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.lines() {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// Log `error` and its cause chain at error level, one line per event.
pub fn report_error(error: &(dyn StdError + 'static)) {
    for line in ErrorReport::new(error).lines() {
        error!("{}", line);
    }
}
