//! Operation endpoints.
//!
//! An endpoint is one operation (read, write, monitor, ...) bound to one
//! channel and one [`PvRequest`]. The endpoint implementations live with
//! the protocol engine; the channel handle only constructs them through
//! [`EndpointFactory`] and drives their activation step.

use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

use crate::Channel;
use crate::PvRequest;
use crate::PvaClient;
use crate::PvaClientChannel;
use crate::Result;

/// Read endpoint
#[cfg_attr(test, automock)]
pub trait ClientGet: Send + Sync + 'static {
    fn connect(&self) -> Result<()>;
}

/// Write endpoint
#[cfg_attr(test, automock)]
pub trait ClientPut: Send + Sync + 'static {
    fn connect(&self) -> Result<()>;

    /// Fetches the current value so the write structure is populated
    fn get(&self) -> Result<()>;
}

/// Receives monitor events on behalf of the application
#[cfg_attr(test, automock)]
pub trait MonitorRequester: Send + Sync + 'static {
    fn event(&self);

    /// The server stopped sending events for this monitor
    fn unlisten(&self) {}
}

/// Streaming-subscribe endpoint
#[cfg_attr(test, automock)]
pub trait ClientMonitor: Send + Sync + 'static {
    fn connect(&self) -> Result<()>;

    fn set_requester(
        &self,
        requester: Arc<dyn MonitorRequester>,
    );

    fn start(&self) -> Result<()>;
}

/// Process-trigger endpoint
#[cfg_attr(test, automock)]
pub trait ClientProcess: Send + Sync + 'static {
    fn connect(&self) -> Result<()>;
}

/// Read-write endpoint. Not constructible in this revision.
pub trait ClientPutGet: Send + Sync + 'static {
    fn connect(&self) -> Result<()>;
}

/// Remote-call endpoint. Not constructible in this revision.
pub trait ClientRpc: Send + Sync + 'static {
    fn connect(&self) -> Result<()>;
}

/// Array-access endpoint. Not constructible in this revision.
pub trait ClientArray: Send + Sync + 'static {
    fn connect(&self) -> Result<()>;
}

/// Field introspection. Not constructible in this revision.
pub trait ClientField: Send + Sync + 'static {
    fn sub_field(&self) -> String;
}

/// Per-kind endpoint constructors supplied by the protocol engine
///
/// Each constructor receives the owning client, the channel handle, the
/// provider-level channel and the descriptor. Endpoints that keep the
/// handle should hold it through [`Arc::downgrade`]: the handle's request
/// caches own the endpoints.
#[cfg_attr(test, automock)]
pub trait EndpointFactory: Send + Sync + 'static {
    fn create_get(
        &self,
        client: &Arc<PvaClient>,
        channel: &Arc<PvaClientChannel>,
        provider_channel: &Arc<dyn Channel>,
        request: &PvRequest,
    ) -> Arc<dyn ClientGet>;

    fn create_put(
        &self,
        client: &Arc<PvaClient>,
        channel: &Arc<PvaClientChannel>,
        provider_channel: &Arc<dyn Channel>,
        request: &PvRequest,
    ) -> Arc<dyn ClientPut>;

    fn create_monitor(
        &self,
        client: &Arc<PvaClient>,
        channel: &Arc<PvaClientChannel>,
        provider_channel: &Arc<dyn Channel>,
        request: &PvRequest,
    ) -> Arc<dyn ClientMonitor>;

    fn create_process(
        &self,
        client: &Arc<PvaClient>,
        channel: &Arc<PvaClientChannel>,
        provider_channel: &Arc<dyn Channel>,
        request: &PvRequest,
    ) -> Arc<dyn ClientProcess>;
}
