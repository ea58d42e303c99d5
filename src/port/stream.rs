//! Account-scoped push streams.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{Platform, PrivateEvent};
use crate::error::Result;

/// Receives normalized private events on the stream's dispatch task.
pub type EventHandler = Arc<dyn Fn(PrivateEvent) + Send + Sync>;

/// Authenticated order, position and account updates for one account.
///
/// Implementations re-authenticate and re-subscribe on their own after every
/// reconnect.
#[async_trait]
pub trait PrivateStream: Send + Sync {
    fn platform(&self) -> Platform;

    /// Authenticate and start streaming. Idempotent while running.
    async fn start(&self) -> Result<()>;

    /// Stop streaming and release venue-side session state.
    async fn stop(&self);

    fn is_running(&self) -> bool;

    /// Track a symbol on venues that subscribe per instrument.
    async fn add_symbol(&self, symbol: &str) -> Result<()>;

    async fn remove_symbol(&self, symbol: &str) -> Result<()>;

    /// Replace the event handler.
    fn set_on_event(&self, handler: EventHandler);
}
