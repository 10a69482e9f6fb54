//! An error carrying the process exit code it should produce (spec §6.5: 0
//! success, 1 generic failure/warnings, 2 critical/argument error, 3
//! signal-driven abort, 4 stuck-intervention exit, 5 claim/prepare failure).
//! Commands return this through the normal `anyhow::Result` chain instead of
//! calling `std::process::exit` themselves; only `main` terminates the process.

use std::fmt;

#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    pub message: String,
}

impl ExitError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExitError {}
