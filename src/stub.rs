//! Stub definitions and the built-in stub table.

use crate::error::SyntheticError;
use bytes::Bytes;
use http::StatusCode;

/// A single stub: a path fragment and the canned outcome it produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubDefinition {
    /// Unique identifier for this stub
    pub id: String,

    /// Substring matched against the request URL path
    pub path_fragment: String,

    /// HTTP status code of the synthetic response
    pub status: StatusCode,

    /// Response body, if any
    pub payload: Option<Bytes>,

    /// Failure to report instead of a response
    pub error: Option<SyntheticError>,
}

impl StubDefinition {
    /// Create a stub answering `200 OK` with an empty body.
    pub fn new(id: impl Into<String>, path_fragment: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path_fragment: path_fragment.into(),
            status: StatusCode::OK,
            payload: None,
            error: None,
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn with_error(mut self, error: SyntheticError) -> Self {
        self.error = Some(error);
        self
    }

    /// Whether this stub applies to the given URL path.
    pub fn matches(&self, path: &str) -> bool {
        path.contains(self.path_fragment.as_str())
    }
}

/// One row of the built-in stub table.
///
/// Payloads are named rather than embedded; they are resolved through a
/// [`FixtureSource`](crate::fixture::FixtureSource) when the registry is built.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinStub {
    pub id: &'static str,
    pub path_fragment: &'static str,
    pub status: StatusCode,
    pub fixture: Option<&'static str>,
    pub error: Option<SyntheticError>,
}

/// The fixed set of stubs, in match priority order.
pub const BUILTIN_STUBS: &[BuiltinStub] = &[
    BuiltinStub {
        id: "korea",
        path_fragment: "api/v1/kr/apple-music",
        status: StatusCode::OK,
        fixture: Some("itunes-kr.json"),
        error: None,
    },
    BuiltinStub {
        id: "uk",
        path_fragment: "api/v1/gb/apple-music",
        status: StatusCode::OK,
        fixture: Some("itunes-uk.json"),
        error: None,
    },
];
