//! Errors raised while configuring the logging engine.
//!
//! Rendering and logging never fail; only configuration (building a policy
//! registry, parsing levels and positions) can.

use thiserror::Error;

/// A policy registry could not be built.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum RegistryError {
    /// The same method was registered twice.
    #[error("method `{0}` is registered more than once")]
    DuplicateMethod(String),
    /// A parameter policy targets a position the method does not declare.
    #[error("method `{method}` declares {declared} parameter(s), but a policy targets index {index}")]
    ParameterOutOfRange {
        method: String,
        index: usize,
        declared: usize,
    },
    /// A type-level configuration was registered twice for the same type.
    #[error("type `{0}` already has a default operation configuration")]
    DuplicateTypeConfig(String),
}

/// A string did not name a log level.
#[derive(Debug, Error, Eq, PartialEq)]
#[error("unknown log level `{0}`; expected one of TRACE, DEBUG, INFO, WARN, ERROR")]
pub struct ParseLevelError(pub String);

/// A string did not name a mask position.
#[derive(Debug, Error, Eq, PartialEq)]
#[error("unknown mask position `{0}`; expected `prefix` or `suffix`")]
pub struct ParsePositionError(pub String);
