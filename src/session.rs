//! In-process host networking stack.
//!
//! A [`Session`] owns the installed protocol handlers. For each request it
//! picks the handler that accepts it, runs the load on the tokio runtime and
//! assembles the callback events into a [`LoadedResponse`] or an error.
//! There is no network transport behind the handlers: a request nobody
//! accepts resolves to [`InterceptError::Unhandled`].

use crate::error::{InterceptError, Result, SyntheticError};
use crate::protocol::{
    CachePolicy, InterceptedRequest, ProtocolClient, ProtocolHandler, ResponseHead,
};
use bytes::{Bytes, BytesMut};
use http::StatusCode;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

/// One callback received from a protocol handler.
#[derive(Debug, Clone)]
pub enum LoadEvent {
    Response {
        head: ResponseHead,
        cache_policy: CachePolicy,
    },
    Data(Bytes),
    Failure(SyntheticError),
    Complete,
}

impl LoadEvent {
    fn is_terminal(&self) -> bool {
        matches!(self, LoadEvent::Failure(_) | LoadEvent::Complete)
    }

    fn label(&self) -> &'static str {
        match self {
            LoadEvent::Response { .. } => "response",
            LoadEvent::Data(_) => "data",
            LoadEvent::Failure(_) => "failure",
            LoadEvent::Complete => "completion",
        }
    }
}

/// Forwards handler callbacks to the task awaiting the response.
struct ChannelClient {
    events: mpsc::UnboundedSender<LoadEvent>,
}

impl ChannelClient {
    fn send(&self, event: LoadEvent) {
        // The receiver is gone only when the task was dropped.
        let _ = self.events.send(event);
    }
}

impl ProtocolClient for ChannelClient {
    fn on_response(&mut self, head: ResponseHead, cache_policy: CachePolicy) {
        self.send(LoadEvent::Response { head, cache_policy });
    }

    fn on_data(&mut self, chunk: Bytes) {
        self.send(LoadEvent::Data(chunk));
    }

    fn on_failure(&mut self, error: SyntheticError) {
        self.send(LoadEvent::Failure(error));
    }

    fn on_complete(&mut self) {
        self.send(LoadEvent::Complete);
    }
}

/// A finished synthetic response.
#[derive(Debug, Clone)]
pub struct LoadedResponse {
    pub head: ResponseHead,
    pub cache_policy: CachePolicy,
    pub body: Bytes,
}

impl LoadedResponse {
    pub fn status(&self) -> StatusCode {
        self.head.status
    }

    /// Body decoded as UTF-8, lossily.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Body deserialized from JSON.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}

/// Collects protocol handlers before the session is built.
#[derive(Default)]
pub struct SessionBuilder {
    handlers: Vec<Arc<dyn ProtocolHandler>>,
}

impl SessionBuilder {
    /// Install a protocol handler.
    ///
    /// Handler names must be unique within a session.
    pub fn register(mut self, handler: Arc<dyn ProtocolHandler>) -> Result<Self> {
        let name = handler.name();
        if name.is_empty() {
            return Err(InterceptError::Registration {
                handler: String::new(),
                reason: "handler name cannot be empty".to_string(),
            });
        }
        if self.handlers.iter().any(|h| h.name() == name) {
            return Err(InterceptError::Registration {
                handler: name.to_string(),
                reason: "a handler with this name is already registered".to_string(),
            });
        }

        info!(handler = name, "Protocol handler registered");
        self.handlers.push(handler);
        Ok(self)
    }

    pub fn build(self) -> Session {
        Session {
            handlers: self.handlers.into(),
        }
    }
}

/// Host networking stack with a fixed set of protocol handlers.
#[derive(Clone)]
pub struct Session {
    handlers: Arc<[Arc<dyn ProtocolHandler>]>,
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    /// Names of installed handlers, in registration order.
    pub fn handler_names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// The handler that takes `request`. Later registrations are asked first.
    pub fn handler_for(&self, request: &InterceptedRequest) -> Option<Arc<dyn ProtocolHandler>> {
        self.handlers
            .iter()
            .rev()
            .find(|h| h.can_handle(request))
            .cloned()
    }

    /// Start loading `request` on the current tokio runtime.
    ///
    /// Called outside a runtime, the returned task resolves to
    /// [`InterceptError::NoRuntime`].
    pub fn data_task(&self, request: InterceptedRequest) -> DataTask {
        let Some(handler) = self.handler_for(&request) else {
            debug!(url = %request.url, "No protocol handler accepted request");
            return DataTask {
                state: TaskState::Unhandled(request.url),
            };
        };

        let Ok(runtime) = Handle::try_current() else {
            warn!(url = %request.url, "No tokio runtime to load request on");
            return DataTask {
                state: TaskState::NoRuntime,
            };
        };

        let request = handler.canonical_request(&request);
        debug!(handler = handler.name(), url = %request.url, "Delegating request");

        let (tx, rx) = mpsc::unbounded_channel();
        let task_handler = Arc::clone(&handler);
        let task_request = request.clone();
        let join = runtime.spawn(async move {
            let mut client = ChannelClient { events: tx };
            task_handler.start_loading(&task_request, &mut client).await;
        });

        DataTask {
            state: TaskState::Running {
                handler,
                request,
                join,
                events: rx,
                received: Vec::new(),
                cancelled: false,
            },
        }
    }

    /// Load `request` and wait for its outcome.
    pub async fn send(&self, request: InterceptedRequest) -> Result<LoadedResponse> {
        self.data_task(request).response().await
    }
}

enum TaskState {
    Unhandled(Url),
    NoRuntime,
    Running {
        handler: Arc<dyn ProtocolHandler>,
        request: InterceptedRequest,
        join: JoinHandle<()>,
        events: mpsc::UnboundedReceiver<LoadEvent>,
        /// Events drained from the channel before `response` was awaited.
        received: Vec<LoadEvent>,
        cancelled: bool,
    },
}

/// A request in flight.
pub struct DataTask {
    state: TaskState,
}

impl DataTask {
    /// Cancel the request if it has not reached a terminal event yet.
    pub fn cancel(&mut self) {
        if let TaskState::Running {
            handler,
            request,
            join,
            events,
            received,
            cancelled,
        } = &mut self.state
        {
            if *cancelled || join.is_finished() {
                return;
            }

            while let Ok(event) = events.try_recv() {
                received.push(event);
            }
            if received.iter().any(LoadEvent::is_terminal) {
                debug!(url = %request.url, "Request already finished, ignoring cancel");
                return;
            }

            handler.stop_loading(request);
            join.abort();
            *cancelled = true;
        }
    }

    /// Wait for the terminal event and assemble the outcome.
    pub async fn response(self) -> Result<LoadedResponse> {
        let (join, mut events, mut collected) = match self.state {
            TaskState::Unhandled(url) => return Err(InterceptError::Unhandled { url }),
            TaskState::NoRuntime => return Err(InterceptError::NoRuntime),
            TaskState::Running { cancelled: true, .. } => return Err(InterceptError::Cancelled),
            TaskState::Running {
                join,
                events,
                received,
                ..
            } => (join, events, received),
        };

        if !collected.iter().any(LoadEvent::is_terminal) {
            while let Some(event) = events.recv().await {
                let terminal = event.is_terminal();
                collected.push(event);
                if terminal {
                    break;
                }
            }
        }

        // The lifecycle is over once a terminal event arrives; a handler
        // still running past that point is stopped.
        let terminated = collected.iter().any(LoadEvent::is_terminal);
        if terminated {
            join.abort();
        }
        while let Some(event) = events.recv().await {
            collected.push(event);
        }

        match join.await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() && terminated => {}
            Err(e) if e.is_cancelled() => return Err(InterceptError::Cancelled),
            Err(e) => {
                return Err(InterceptError::ContractViolation(format!(
                    "handler panicked: {e}"
                )))
            }
        }

        assemble(collected)
    }
}

/// Turn a handler's event sequence into an outcome.
///
/// Valid sequences are `[failure]` and `[response, data*, completion]`.
fn assemble(events: Vec<LoadEvent>) -> Result<LoadedResponse> {
    let mut events = events.into_iter();

    match events.next() {
        Some(LoadEvent::Failure(error)) => match events.next() {
            None => Err(InterceptError::Synthetic(error)),
            Some(extra) => violation(format!("{} after failure", extra.label())),
        },
        Some(LoadEvent::Response { head, cache_policy }) => {
            let mut body = BytesMut::new();
            loop {
                match events.next() {
                    Some(LoadEvent::Data(chunk)) => body.extend_from_slice(&chunk),
                    Some(LoadEvent::Complete) => break,
                    Some(other) => {
                        return violation(format!("{} after response", other.label()))
                    }
                    None => return violation("handler returned without completing"),
                }
            }
            if let Some(extra) = events.next() {
                return violation(format!("{} after completion", extra.label()));
            }
            Ok(LoadedResponse {
                head,
                cache_policy,
                body: body.freeze(),
            })
        }
        Some(other) => violation(format!("{} before response", other.label())),
        None => violation("handler returned without emitting any event"),
    }
}

fn violation(msg: impl Into<String>) -> Result<LoadedResponse> {
    Err(InterceptError::ContractViolation(msg.into()))
}
