//! Diagnostics in the form Xcode's build log parser understands
//!
//! Lines of the form `:: warning: <msg>` on stdout and `:: error: <msg>` on
//! stderr surface as issues in the IDE. Every line is flushed immediately so
//! messages interleave correctly with relayed builder output.

use std::io::{self, Write};

/// Format a message as an IDE warning line
pub fn format_warning(msg: &str) -> String {
    format!(":: warning: {msg}")
}

/// Format a message as an IDE error line
pub fn format_error(msg: &str) -> String {
    format!(":: error: {msg}")
}

/// Print a warning to stdout
pub fn warning(msg: &str) {
    tracing::debug!("ide warning: {msg}");
    let mut out = io::stdout().lock();
    let _ = writeln!(out, "{}", format_warning(msg));
    let _ = out.flush();
}

/// Print an error to stderr
pub fn error(msg: &str) {
    tracing::debug!("ide error: {msg}");
    let mut err = io::stderr().lock();
    let _ = writeln!(err, "{}", format_error(msg));
    let _ = err.flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formats() {
        assert_eq!(format_warning("x"), ":: warning: x");
        assert_eq!(format_error("y"), ":: error: y");
    }
}
