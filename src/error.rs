//! The shell's error taxonomy.
//!
//! Lexer and evaluator errors are reported to stderr and abort the current
//! chunk; they do not implement `std::error::Error` propagation past that
//! boundary on their own. [`ShellError`] exists so every fallible subsystem
//! returns a uniform type instead of ad hoc strings.

pub type Result<T> = std::result::Result<T, ShellError>;

/// One of the shell's five error kinds.
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    /// Unterminated string, unterminated substitution, bad escape.
    #[error("{0}")]
    Lex(String),

    /// Unexpected token, unbalanced block, missing `then`/`do`/`in`.
    #[error("{0}")]
    Parse(String),

    /// `findCommand` could not resolve a bare name against `$PATH`.
    #[error("{0}: command not found")]
    Resolution(String),

    /// A platform primitive failed; carries the errno name when available.
    #[error("{0}")]
    Io(String),

    /// A builtin was invoked with the wrong number/shape of arguments.
    #[error("{0}")]
    BuiltinUsage(String),
}

impl ShellError {
    /// Renders the way every user-visible shell message is rendered:
    /// `vbls: <message>`. Callers are responsible for the trailing newline.
    pub fn user_message(&self) -> String {
        format!("vbls: {self}")
    }
}

impl From<nix::Error> for ShellError {
    fn from(err: nix::Error) -> Self {
        ShellError::Io(err.to_string())
    }
}

impl From<std::io::Error> for ShellError {
    fn from(err: std::io::Error) -> Self {
        ShellError::Io(err.to_string())
    }
}

/// Prints `vbls: <message>` to stderr, the shell's user-visible error format.
pub fn report(err: &ShellError) {
    eprintln!("{}", err.user_message());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_is_prefixed() {
        let e = ShellError::Resolution("frobnicate".into());
        assert_eq!(e.user_message(), "vbls: frobnicate: command not found");
    }
}
