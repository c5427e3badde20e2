//! Worker state machine and the event dispatcher.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use offkit_net::{Request, Response};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::events::{EventKind, ExtendableEvent, FetchEvent};
use crate::SwError;

/// Worker lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
    /// Registered, no event fired yet.
    #[default]
    Parsed,
    /// Install event in flight.
    Installing,
    /// Installed, not yet activated.
    Installed,
    /// Activate event in flight.
    Activating,
    /// Active and controlling requests.
    Activated,
    /// Install failed; this worker version will never control requests.
    Redundant,
}

/// The three handlers a worker registers against the dispatcher.
///
/// Install and activate receive an [`ExtendableEvent`] to register deferred
/// work on; the fetch handler resolves the routing decision and returns the
/// response to deliver.
#[async_trait]
pub trait EventHandlers: Send + Sync {
    /// Install: prime the cache. Fired once per worker version.
    async fn on_install(&self, event: &mut ExtendableEvent) -> Result<(), SwError>;

    /// Activate: evict stale stores, then claim open pages.
    async fn on_activate(&self, event: &mut ExtendableEvent) -> Result<(), SwError>;

    /// Fetch: route an intercepted request.
    async fn on_fetch(&self, event: FetchEvent) -> Result<Response, SwError>;
}

/// Dispatcher driving a worker through its lifecycle.
///
/// The host fires each lifecycle event at most once, settles the event's
/// deferred work before advancing the state machine, and refuses fetch
/// routing until the worker is activated.
pub struct WorkerHost {
    handlers: Arc<dyn EventHandlers>,
    state: RwLock<WorkerState>,
    skip_waiting: AtomicBool,
}

impl WorkerHost {
    /// Create a host for a set of handlers.
    pub fn new(handlers: Arc<dyn EventHandlers>) -> Self {
        Self {
            handlers,
            state: RwLock::new(WorkerState::Parsed),
            skip_waiting: AtomicBool::new(false),
        }
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Whether the install handler requested immediate takeover.
    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::Relaxed)
    }

    /// Fire the install event and settle its deferred work.
    ///
    /// On failure the worker becomes redundant; re-registering a new host is
    /// the platform's retry, not this one's.
    pub async fn install(&self) -> Result<(), SwError> {
        self.transition(WorkerState::Parsed, WorkerState::Installing, "install")
            .await?;

        let mut event = ExtendableEvent::new(EventKind::Install);
        let result = match self.handlers.on_install(&mut event).await {
            Ok(()) => {
                if event.skip_waiting_requested() {
                    self.skip_waiting.store(true, Ordering::Relaxed);
                    debug!("immediate takeover requested");
                }
                event.settle().await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                *self.state.write().await = WorkerState::Installed;
                info!("worker installed");
                Ok(())
            }
            Err(e) => {
                *self.state.write().await = WorkerState::Redundant;
                error!(error = %e, "install failed; worker is redundant");
                Err(e)
            }
        }
    }

    /// Fire the activate event and settle its deferred work. Deferred work
    /// registered by the handler is fully settled before this returns, so
    /// anything sequenced inside it (stale-store deletion, then claiming)
    /// has resolved by the time the worker is activated.
    pub async fn activate(&self) -> Result<(), SwError> {
        self.transition(WorkerState::Installed, WorkerState::Activating, "activate")
            .await?;

        let mut event = ExtendableEvent::new(EventKind::Activate);
        let result = match self.handlers.on_activate(&mut event).await {
            Ok(()) => event.settle().await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                *self.state.write().await = WorkerState::Activated;
                info!("worker activated");
                Ok(())
            }
            Err(e) => {
                *self.state.write().await = WorkerState::Redundant;
                error!(error = %e, "activation failed; worker is redundant");
                Err(e)
            }
        }
    }

    /// Install and activate in one step. With a single-worker host there is
    /// no waiting queue, so takeover is immediate either way.
    pub async fn start(&self) -> Result<(), SwError> {
        self.install().await?;
        self.activate().await
    }

    /// Route an intercepted request. Only legal once activated.
    pub async fn fetch(&self, request: Request) -> Result<Response, SwError> {
        let state = self.state().await;
        if state != WorkerState::Activated {
            return Err(SwError::InvalidState(format!(
                "fetch routed in state {:?}",
                state
            )));
        }
        self.handlers.on_fetch(FetchEvent::new(request)).await
    }

    async fn transition(
        &self,
        from: WorkerState,
        to: WorkerState,
        event: &str,
    ) -> Result<(), SwError> {
        let mut state = self.state.write().await;
        if *state != from {
            return Err(SwError::InvalidState(format!(
                "{} event fired in state {:?}",
                event, *state
            )));
        }
        *state = to;
        debug!(?to, "lifecycle transition");
        Ok(())
    }
}
