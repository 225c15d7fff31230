//! Host networking stack contract.
//!
//! A [`ProtocolHandler`] is installed into a [`Session`](crate::session::Session)
//! and is asked, for every outgoing request, whether it wants to handle it.
//! An accepting handler drives a [`ProtocolClient`] through exactly one of:
//!
//! - `on_failure`
//! - `on_response`, zero or more `on_data`, `on_complete`

use crate::error::SyntheticError;
use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Version};
use percent_encoding::percent_decode_str;
use std::borrow::Cow;
use url::Url;

/// The percent-decoded path of `url`.
pub fn decoded_path(url: &Url) -> Cow<'_, str> {
    percent_decode_str(url.path()).decode_utf8_lossy()
}

/// An outgoing request as seen by protocol handlers.
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    pub method: Method,
    pub url: Url,
    /// Carried for handlers that want them; stub matching ignores them.
    pub headers: HeaderMap,
}

impl InterceptedRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
        }
    }

    /// A `GET` request for `url`.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Parse `url` and build a request for it.
    pub fn parse(method: Method, url: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(method, Url::parse(url)?))
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// The percent-decoded URL path, which is all stub matching looks at.
    pub fn path(&self) -> Cow<'_, str> {
        decoded_path(&self.url)
    }
}

/// Status line and headers of a synthetic response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub url: Url,
    pub status: StatusCode,
    pub version: Version,
    pub headers: HeaderMap,
}

impl ResponseHead {
    /// An HTTP/1.1 head with no headers.
    pub fn new(url: Url, status: StatusCode) -> Self {
        Self {
            url,
            status,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
        }
    }
}

/// How the host stack may cache a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    Allowed,
    AllowedInMemoryOnly,
    NotAllowed,
}

/// Receives the events of one request lifecycle.
pub trait ProtocolClient: Send {
    fn on_response(&mut self, head: ResponseHead, cache_policy: CachePolicy);

    fn on_data(&mut self, chunk: Bytes);

    fn on_failure(&mut self, error: SyntheticError);

    fn on_complete(&mut self);
}

/// A hook the host stack consults before sending a request to the network.
#[async_trait]
pub trait ProtocolHandler: Send + Sync {
    /// Name used to identify the handler within a session.
    fn name(&self) -> &str;

    /// Whether this handler wants to take over `request`.
    ///
    /// Called for every request the session considers, so it must be cheap
    /// and free of side effects.
    fn can_handle(&self, request: &InterceptedRequest) -> bool;

    /// The form of `request` the handler will actually load.
    fn canonical_request(&self, request: &InterceptedRequest) -> InterceptedRequest {
        request.clone()
    }

    /// Whether two requests may share a cached response.
    fn request_is_cache_equivalent(
        &self,
        _a: &InterceptedRequest,
        _b: &InterceptedRequest,
    ) -> bool {
        false
    }

    /// Produce the outcome of `request` through `client`.
    async fn start_loading(&self, request: &InterceptedRequest, client: &mut dyn ProtocolClient);

    /// Called when the host stack cancels a request that is still loading.
    fn stop_loading(&self, request: &InterceptedRequest);
}
