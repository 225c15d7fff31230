//! Error types for the interceptor.

use std::fmt;
use thiserror::Error;
use url::Url;

/// Errors raised while installing the interceptor or driving a request.
#[derive(Debug, Error)]
pub enum InterceptError {
    /// A protocol handler could not be installed into the session.
    #[error("failed to register protocol handler '{handler}': {reason}")]
    Registration { handler: String, reason: String },

    /// A stub definition was rejected while building the registry.
    #[error("invalid stub '{id}': {reason}")]
    InvalidStub { id: String, reason: String },

    /// A fixture could not be resolved (strict mode only).
    #[error(transparent)]
    Fixture(#[from] FixtureError),

    /// The matched stub models a network failure.
    #[error("synthetic failure: {0}")]
    Synthetic(#[from] SyntheticError),

    /// No installed handler accepted the request.
    #[error("no protocol handler accepted {url}")]
    Unhandled { url: Url },

    /// A handler emitted an event sequence the session cannot assemble.
    #[error("protocol contract violation: {0}")]
    ContractViolation(String),

    /// The request was started outside a tokio runtime.
    #[error("no tokio runtime available to load the request")]
    NoRuntime,

    /// The request was cancelled before a terminal event arrived.
    #[error("request cancelled")]
    Cancelled,
}

/// Errors raised while resolving a named fixture.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("fixture '{0}' not found")]
    NotFound(String),

    #[error("invalid fixture name '{0}'")]
    InvalidName(String),

    #[error("failed to read fixture '{name}': {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Kind of network failure a stub can fabricate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkErrorKind {
    NotConnected,
    TimedOut,
    CannotFindHost,
    BadServerResponse,
    Cancelled,
}

impl NetworkErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkErrorKind::NotConnected => "not_connected",
            NetworkErrorKind::TimedOut => "timed_out",
            NetworkErrorKind::CannotFindHost => "cannot_find_host",
            NetworkErrorKind::BadServerResponse => "bad_server_response",
            NetworkErrorKind::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fabricated network error returned by a stub instead of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct SyntheticError {
    pub kind: NetworkErrorKind,
    pub message: &'static str,
}

impl SyntheticError {
    pub const fn new(kind: NetworkErrorKind, message: &'static str) -> Self {
        Self { kind, message }
    }
}

pub type Result<T> = std::result::Result<T, InterceptError>;
