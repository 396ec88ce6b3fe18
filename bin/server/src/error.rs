//! Domain error types for server operations.
//!
//! Errors are designed for layered context using rootcause:
//! - `RouteError`: malformed or conflicting route registrations
//! - `StartupError`: the stage of startup that failed, with the underlying
//!   report as its cause

use std::fmt;

/// Errors raised while registering routes.
///
/// All of these are programming or configuration mistakes caught at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// The pattern is malformed (no leading `/`, stray braces, empty or
    /// repeated capture names).
    InvalidPattern { pattern: String, reason: String },
    /// A capture declared a type other than string, int or bool.
    UnknownCaptureType { pattern: String, kind: String },
    /// The same method and pattern shape was already registered.
    DuplicateRoute { method: String, pattern: String },
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPattern { pattern, reason } => {
                write!(f, "invalid route pattern '{}': {}", pattern, reason)
            }
            Self::UnknownCaptureType { pattern, kind } => {
                write!(f, "route pattern '{}': unknown capture type '{}'", pattern, kind)
            }
            Self::DuplicateRoute { method, pattern } => {
                write!(f, "route {} '{}' is already registered", method, pattern)
            }
        }
    }
}

impl std::error::Error for RouteError {}

/// The startup stage that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupError {
    /// Reading or deserializing configuration.
    Config,
    /// Building the identity providers.
    Providers,
    /// Building the route table.
    Routes,
    /// Binding the listener.
    Bind,
    /// The HTTP server stopped with an error.
    Serve,
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config => write!(f, "failed to load configuration"),
            Self::Providers => write!(f, "failed to build identity providers"),
            Self::Routes => write!(f, "failed to build routes"),
            Self::Bind => write!(f, "failed to bind listener"),
            Self::Serve => write!(f, "server error"),
        }
    }
}

impl std::error::Error for StartupError {}
