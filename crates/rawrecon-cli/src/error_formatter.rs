//! Turns a [`rawrecon_core::error::Error`] into the short, colored line
//! printed on stderr before the process exits non-zero.

use colored::Colorize;

use rawrecon_core::error::Error;

/// Format `error` as a single user-facing line. `Interrupted` gets its own
/// wording ("Process stopped"); everything else is prefixed with "ERROR".
pub fn format_error(error: &Error) -> String {
    match error {
        Error::Interrupted => "Process stopped".yellow().to_string(),
        Error::Unexpected(msg) => format!("{}: {}", "Unexpected error".red().bold(), msg),
        other => format!("{}: {}", "ERROR".red().bold(), other),
    }
}

/// The process exit code for a given error.
///
/// `Interrupted` exits 0, not a signal-style 128+N code: an interrupted scan
/// still reports whatever partial results it already captured, so it isn't
/// treated as a failure exit.
pub fn exit_code(error: &Error) -> i32 {
    match error {
        Error::Usage(_) => 2,
        Error::Resolution(_) => 3,
        Error::Privilege(_) => 4,
        Error::Interrupted => 0,
        _ => 1,
    }
}
