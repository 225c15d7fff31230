//! Network Interceptor
//!
//! An in-process HTTP interception layer. A protocol handler installed into
//! a [`Session`] takes over outgoing requests whose path matches a stub and
//! answers them with canned fixture responses instead of the network.
//!
//! # Features
//!
//! - **Path Matching**: First stub whose path fragment occurs in the URL path wins
//! - **Fixture Payloads**: Bodies come from bundled fixtures or a directory
//! - **Synthetic Failures**: Stubs can model network errors instead of responses
//! - **Contract Checking**: The session validates every handler's event sequence
//!
//! # Example
//!
//! ```no_run
//! use network_interceptor::{InterceptedRequest, InterceptorConfig, NetworkInterceptor, Session};
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let interceptor = NetworkInterceptor::from_config(&InterceptorConfig::default())?;
//! let session = Session::builder().register(Arc::new(interceptor))?.build();
//!
//! let request = InterceptedRequest::parse(
//!     http::Method::GET,
//!     "https://rss.itunes.apple.com/api/v1/kr/apple-music/top-songs/all/50/explicit.json",
//! )?;
//! let response = session.send(request).await?;
//! assert_eq!(response.status(), http::StatusCode::OK);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod fixture;
pub mod interceptor;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod stub;

pub use config::InterceptorConfig;
pub use error::{InterceptError, SyntheticError};
pub use interceptor::NetworkInterceptor;
pub use protocol::{InterceptedRequest, ProtocolClient, ProtocolHandler};
pub use registry::StubRegistry;
pub use session::Session;
pub use stub::StubDefinition;
