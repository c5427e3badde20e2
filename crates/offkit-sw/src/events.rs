//! Lifecycle events and their pending-work tokens.
//!
//! An [`ExtendableEvent`] is the explicit form of the host's "keep this
//! event pending" token: handlers register deferred work with
//! [`ExtendableEvent::wait_until`], and the dispatcher settles the event —
//! awaiting every registered future — before it advances the lifecycle.

use std::future::Future;

use futures::future::BoxFuture;
use offkit_net::Request;

use crate::SwError;

/// Which lifecycle event an extendable token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Install,
    Activate,
}

/// An event that can be extended with deferred work.
pub struct ExtendableEvent {
    kind: EventKind,
    skip_waiting: bool,
    pending: Vec<BoxFuture<'static, Result<(), SwError>>>,
}

impl ExtendableEvent {
    /// Create a new event token.
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            skip_waiting: false,
            pending: Vec::new(),
        }
    }

    /// The event this token belongs to.
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Register deferred work. The dispatcher will not advance the worker
    /// lifecycle until this future resolves.
    pub fn wait_until<F>(&mut self, work: F)
    where
        F: Future<Output = Result<(), SwError>> + Send + 'static,
    {
        self.pending.push(Box::pin(work));
    }

    /// Request immediate takeover: do not wait for an existing worker to
    /// finish before this one takes control.
    pub fn request_skip_waiting(&mut self) {
        self.skip_waiting = true;
    }

    /// Whether immediate takeover was requested.
    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting
    }

    /// Await all registered work in registration order. The first error
    /// settles the event as failed.
    pub async fn settle(self) -> Result<(), SwError> {
        for work in self.pending {
            work.await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ExtendableEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtendableEvent")
            .field("kind", &self.kind)
            .field("skip_waiting", &self.skip_waiting)
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// An intercepted network request awaiting a routing decision.
#[derive(Debug, Clone)]
pub struct FetchEvent {
    request: Request,
    client_id: Option<String>,
}

impl FetchEvent {
    /// Create a fetch event for a request.
    pub fn new(request: Request) -> Self {
        Self {
            request,
            client_id: None,
        }
    }

    /// Attach the originating client.
    pub fn with_client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// The intercepted request.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// The originating client, if known.
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// Consume the event, yielding the request.
    pub fn into_request(self) -> Request {
        self.request
    }
}
