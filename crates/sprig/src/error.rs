//! Runtime error kinds and the error value carried through evaluation.
//!
//! Errors propagate as `Result` values, unwinding the evaluator frames up
//! to the nearest catch point; the VM truncates the root-protection stack
//! to the depth recorded at that point. At the boundary an error is
//! rendered into an error cell (`(message . irritants)`) for printing, and
//! the pre-allocated system-error cell stands in if the heap is too
//! exhausted to allocate one.

use std::fmt::{self, Display};

use strum::{Display as StrumDisplay, EnumString, IntoStaticStr};

/// Result type alias for operations that can raise a runtime error.
pub type RunResult<T> = Result<T, LispError>;

/// The error taxonomy. The string form is the kind's surface name
/// (`type-error`, `unbound`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, EnumString, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum ErrKind {
    /// Operation applied to a value of the wrong type.
    TypeError,
    /// Reference to an undefined variable.
    Unbound,
    /// Wrong number of arguments.
    ArityError,
    /// Out-of-bounds index or domain violation.
    RangeError,
    /// Port or filesystem failure.
    IoError,
    /// Malformed input syntax.
    ReadError,
    /// Heap or stack exhaustion.
    ResourceError,
    /// Raised by the program.
    UserError,
}

/// A raised runtime error: kind, message, and pre-rendered irritants.
///
/// Irritants are rendered to text at raise time so the error value never
/// holds cell references across collector activity.
#[derive(Debug, Clone)]
pub struct LispError {
    pub kind: ErrKind,
    pub message: String,
    pub irritants: Vec<String>,
}

impl LispError {
    pub fn new(kind: ErrKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), irritants: Vec::new() }
    }

    pub fn with_irritants(kind: ErrKind, message: impl Into<String>, irritants: Vec<String>) -> Self {
        Self { kind, message: message.into(), irritants }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrKind::TypeError, message)
    }

    /// The standard "expected X, got Y" complaint.
    pub fn expected(what: &str, got: &'static str) -> Self {
        Self::new(ErrKind::TypeError, format!("expected {what}, got {got}"))
    }

    pub fn unbound(name: &str) -> Self {
        Self::new(ErrKind::Unbound, format!("unbound variable: {name}"))
    }

    pub fn arity(proc_name: &str, expected: &str, got: usize) -> Self {
        Self::new(
            ErrKind::ArityError,
            format!("{proc_name}: expected {expected} argument(s), got {got}"),
        )
    }

    pub fn range(message: impl Into<String>) -> Self {
        Self::new(ErrKind::RangeError, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrKind::IoError, message)
    }

    /// Read errors carry the source position in the message.
    pub fn read(message: impl Into<String>, line: u32, col: u32) -> Self {
        Self::new(ErrKind::ReadError, format!("{}:{}: {}", line, col, message.into()))
    }

    pub fn resource(message: impl Into<String>) -> Self {
        Self::new(ErrKind::ResourceError, message)
    }

    pub fn user(message: impl Into<String>, irritants: Vec<String>) -> Self {
        Self::with_irritants(ErrKind::UserError, message, irritants)
    }
}

impl Display for LispError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        for irritant in &self.irritants {
            write!(f, " {irritant}")?;
        }
        Ok(())
    }
}

impl std::error::Error for LispError {}

impl From<std::io::Error> for LispError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_are_kebab_case() {
        assert_eq!(ErrKind::TypeError.to_string(), "type-error");
        assert_eq!(ErrKind::Unbound.to_string(), "unbound");
        assert_eq!(ErrKind::ArityError.to_string(), "arity-error");
        assert_eq!(ErrKind::ResourceError.to_string(), "resource-error");
    }

    #[test]
    fn display_includes_irritants() {
        let err = LispError::user("boom", vec!["1".into(), "(a b)".into()]);
        assert_eq!(err.to_string(), "user-error: boom 1 (a b)");
    }
}
