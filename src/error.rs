//! Error types for the settle promise engine
//!
//! Two kinds of failure flow through the engine: values thrown by user code
//! (handlers, iterator methods, constructors) which are carried verbatim as
//! [`Error::Throw`], and engine-raised errors such as a `TypeError` for a
//! non-callable handler, which are materialized as error objects only when
//! they have to become a rejection reason.

use crate::runtime::Value;
use std::fmt;
use thiserror::Error;

/// Main error type for settle
#[derive(Error, Debug, Clone)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// A language value thrown by user code (an abrupt "throw" completion)
    #[error("Uncaught {0}")]
    Throw(Value),

    /// Runtime error raised by the engine itself - TypeError, RangeError, etc.
    #[error("{kind}: {message}")]
    RuntimeError { kind: ErrorKind, message: String },

    /// Internal engine invariant violation
    #[error("InternalError: {0}")]
    InternalError(String),

    /// Invalid runtime configuration
    #[error("ConfigError: {0}")]
    ConfigError(String),
}

/// JavaScript error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(clippy::enum_variant_names)]
pub enum ErrorKind {
    /// TypeError - wrong type for operation
    TypeError,
    /// RangeError - value out of range
    RangeError,
    /// ReferenceError - undefined binding
    ReferenceError,
    /// SyntaxError
    SyntaxError,
    /// AggregateError - carries a list of errors (`Promise.any`)
    AggregateError,
    /// Generic Error
    GenericError,
    /// InternalError - internal engine error
    InternalError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl ErrorKind {
    /// The constructor name of the error kind, as it appears in `error.name`
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::TypeError => "TypeError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::AggregateError => "AggregateError",
            ErrorKind::GenericError => "Error",
            ErrorKind::InternalError => "InternalError",
        }
    }
}

impl Error {
    /// Wrap a thrown language value
    pub fn throw(value: Value) -> Self {
        Error::Throw(value)
    }

    /// Create a TypeError
    pub fn type_error(message: impl Into<String>) -> Self {
        Error::RuntimeError {
            kind: ErrorKind::TypeError,
            message: message.into(),
        }
    }

    /// Create a RangeError
    pub fn range_error(message: impl Into<String>) -> Self {
        Error::RuntimeError {
            kind: ErrorKind::RangeError,
            message: message.into(),
        }
    }

    /// Create a runtime error of an arbitrary kind
    pub fn runtime_error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error::RuntimeError {
            kind,
            message: message.into(),
        }
    }

    /// The error kind, if this is an engine-raised error
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::RuntimeError { kind, .. } => Some(*kind),
            Error::InternalError(_) => Some(ErrorKind::InternalError),
            Error::Throw(_) | Error::ConfigError(_) => None,
        }
    }

    /// Check whether this is an engine-raised TypeError
    pub fn is_type_error(&self) -> bool {
        self.kind() == Some(ErrorKind::TypeError)
    }

    /// The thrown value, if this error carries one
    pub fn thrown_value(&self) -> Option<&Value> {
        match self {
            Error::Throw(value) => Some(value),
            _ => None,
        }
    }
}

/// Result type alias for settle
pub type Result<T> = std::result::Result<T, Error>;

/// Standardized error message templates
///
/// These follow the wording JavaScript engines use for the same failures.
pub mod messages {
    pub const NOT_A_FUNCTION: &str = "is not a function";
    pub const NOT_AN_OBJECT: &str = "is not an object";
    pub const NOT_A_CONSTRUCTOR: &str = "is not a constructor";
    pub const NOT_ITERABLE: &str = "is not iterable";

    pub const CAPABILITY_EXECUTOR_CALLED_TWICE: &str =
        "Promise capability executor already called";
    pub const CAPABILITY_NOT_CALLABLE: &str =
        "capability executor did not produce resolve/reject";
    pub const SELF_RESOLUTION: &str = "Chaining cycle detected for promise";
    pub const PROMISE_WITHOUT_NEW: &str = "Promise constructor cannot be invoked without 'new'";
    pub const ITERATOR_RESULT_NOT_OBJECT: &str = "Iterator result is not an object";
    pub const NO_THROW_METHOD: &str = "The iterator does not provide a 'throw' method";
    pub const ALL_PROMISES_REJECTED: &str = "All promises were rejected";

    /// Format a "X is not a function" error message
    pub fn not_a_function(name: &str) -> String {
        format!("{} {}", name, NOT_A_FUNCTION)
    }

    /// Format a "X is not an object" error message
    pub fn not_an_object(name: &str) -> String {
        format!("{} {}", name, NOT_AN_OBJECT)
    }

    /// Format a "X is not a constructor" error message
    pub fn not_a_constructor(name: &str) -> String {
        format!("{} {}", name, NOT_A_CONSTRUCTOR)
    }

    /// Format a "X is not iterable" error message
    pub fn not_iterable(name: &str) -> String {
        format!("{} {}", name, NOT_ITERABLE)
    }

    /// Format a "Cannot read property 'X' of Y" error message
    pub fn cannot_read_property(prop: &str, of: &str) -> String {
        format!("Cannot read property '{}' of {}", prop, of)
    }

    /// Format a "Method X called on incompatible receiver Y" error message
    pub fn incompatible_receiver(method: &str, receiver: &str) -> String {
        format!("Method {} called on incompatible receiver {}", method, receiver)
    }

    /// Format a "X must be Y" error message
    pub fn must_be(what: &str, requirement: &str) -> String {
        format!("{} must be {}", what, requirement)
    }
}
