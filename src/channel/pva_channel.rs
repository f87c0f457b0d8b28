use std::sync::Arc;
use std::sync::Weak;
use std::time::Duration;

use tracing::debug;
use tracing::error;
use tracing::trace;
use tracing::warn;

use super::ChannelRequesterImpl;
use super::ConnectState;
use super::ConnectionStateMachine;
use super::RequestCache;
use super::StateChange;
use crate::constants::DEFAULT_ARRAY_REQUEST;
use crate::constants::DEFAULT_GET_REQUEST;
use crate::constants::DEFAULT_MONITOR_REQUEST;
use crate::constants::DEFAULT_PROCESS_REQUEST;
use crate::constants::DEFAULT_PUT_GET_REQUEST;
use crate::constants::DEFAULT_PUT_REQUEST;
use crate::constants::DEFAULT_RPC_REQUEST;
use crate::endpoint::ClientArray;
use crate::endpoint::ClientField;
use crate::endpoint::ClientGet;
use crate::endpoint::ClientMonitor;
use crate::endpoint::ClientProcess;
use crate::endpoint::ClientPut;
use crate::endpoint::ClientPutGet;
use crate::endpoint::ClientRpc;
use crate::endpoint::MonitorRequester;
use crate::provider::Channel;
use crate::provider::ChannelRequester;
use crate::provider::ConnectionState;
use crate::provider::MessageType;
use crate::provider::Status;
use crate::request::CreateRequest;
use crate::request::PvRequest;
use crate::request::RequestBuilder;
use crate::ChannelError;
use crate::Error;
use crate::PvaClient;
use crate::Result;

/// Client-side handle to one named channel of one provider
///
/// Operations connect the channel on demand (see
/// [`ClientConfig::connect_timeout_in_ms`](crate::ClientConfig)) and
/// read/write endpoints are cached per request string: asking twice for
/// `get_with("value")` returns the same endpoint without a second
/// negotiation with the server.
///
/// Once [`destroy`](Self::destroy) has run every method fails with
/// [`ChannelError::HandleDestroyed`]. Dropping the handle destroys it.
///
/// Only one `connect` may be issued per handle: an explicit second
/// [`connect`](Self::connect) fails with [`ChannelError::AlreadyConnecting`].
/// Operations that auto-connect join an attempt already in flight and wait
/// for its outcome.
pub struct PvaClientChannel {
    client: Weak<PvaClient>,
    self_ref: Weak<PvaClientChannel>,
    channel_name: String,
    provider_name: String,
    state: ConnectionStateMachine,
    create_request: Box<dyn RequestBuilder>,
    pub(super) get_cache: RequestCache<dyn ClientGet>,
    pub(super) put_cache: RequestCache<dyn ClientPut>,
}

impl PvaClientChannel {
    pub(crate) fn create(
        client: &Arc<PvaClient>,
        channel_name: &str,
        provider_name: &str,
    ) -> Arc<Self> {
        Self::with_request_builder(client, channel_name, provider_name, Box::new(CreateRequest::new()))
    }

    pub(crate) fn with_request_builder(
        client: &Arc<PvaClient>,
        channel_name: &str,
        provider_name: &str,
        create_request: Box<dyn RequestBuilder>,
    ) -> Arc<Self> {
        trace!(channel = channel_name, provider = provider_name, "channel handle created");
        Arc::new_cyclic(|self_ref| Self {
            client: Arc::downgrade(client),
            self_ref: self_ref.clone(),
            channel_name: channel_name.to_string(),
            provider_name: provider_name.to_string(),
            state: ConnectionStateMachine::new(channel_name),
            create_request,
            get_cache: RequestCache::new("get"),
            put_cache: RequestCache::new("put"),
        })
    }

    //-----------------------------------------------------------
    // Accessors

    pub fn channel_name(&self) -> Result<String> {
        self.state.ensure_alive()?;
        Ok(self.channel_name.clone())
    }

    pub fn provider_name(&self) -> Result<String> {
        self.state.ensure_alive()?;
        Ok(self.provider_name.clone())
    }

    /// Provider-level channel object, once the engine created it
    pub fn channel(&self) -> Result<Option<Arc<dyn Channel>>> {
        self.state.ensure_alive()?;
        Ok(self.state.channel())
    }

    pub fn connection_state(&self) -> Result<ConnectState> {
        self.state.ensure_alive()?;
        Ok(self.state.state())
    }

    pub fn is_connected(&self) -> Result<bool> {
        Ok(self.connection_state()? == ConnectState::Connected)
    }

    pub fn requester_name(&self) -> Result<String> {
        self.state.ensure_alive()?;
        Ok(self.client()?.requester_name())
    }

    /// Forwards a message to the owning client's message sink
    pub fn message(
        &self,
        message: &str,
        message_type: MessageType,
    ) -> Result<()> {
        self.state.ensure_alive()?;
        self.client()?.message(message, message_type);
        Ok(())
    }

    pub(crate) fn is_destroyed(&self) -> bool {
        self.state.is_destroyed()
    }

    fn client(&self) -> Result<Arc<PvaClient>> {
        self.client.upgrade().ok_or_else(|| ChannelError::OwningClientGone.into())
    }

    fn ptr_self(&self) -> Result<Arc<Self>> {
        self.self_ref
            .upgrade()
            .ok_or_else(|| ChannelError::destroyed(&self.channel_name).into())
    }

    //-----------------------------------------------------------
    // Engine notifications

    pub(crate) fn channel_created(
        &self,
        status: Status,
        channel: Option<Arc<dyn Channel>>,
    ) {
        if self.state.is_destroyed() {
            warn!(channel = %self.channel_name, "channelCreated after destroy ignored");
            return;
        }
        if !status.is_ok() {
            // State is driven by the following state-change notification only
            error!(channel = %self.channel_name, status = %status.message, "channelCreated reported failure");
            return;
        }
        match channel {
            Some(channel) => {
                if self.state.attach_channel(channel).is_err() {
                    debug!(channel = %self.channel_name, "channelCreated raced with destroy");
                }
            }
            None => warn!(channel = %self.channel_name, "channelCreated without channel object"),
        }
    }

    pub(crate) fn channel_state_change(
        &self,
        state: ConnectionState,
    ) {
        match self.state.apply_state_change(state) {
            StateChange::Ignored => {}
            StateChange::Connected => {
                debug!(channel = %self.channel_name, "connected");
            }
            StateChange::Lost(message) => {
                warn!(channel = %self.channel_name, %state, "not connected");
                if let Err(e) = self.message(&message, MessageType::Error) {
                    debug!(channel = %self.channel_name, error = %e, "connection message not delivered");
                }
            }
        }
    }

    //-----------------------------------------------------------
    // Lifecycle

    /// Releases the provider-level channel and clears the endpoint caches.
    /// Idempotent.
    pub fn destroy(&self) {
        let Ok(channel) = self.state.mark_destroyed() else {
            return;
        };
        debug!(
            channel = %self.channel_name,
            cached_gets = self.get_cache.len(),
            cached_puts = self.put_cache.len(),
            "destroy"
        );
        if let Some(channel) = channel {
            channel.destroy();
        }
        self.get_cache.clear();
        self.put_cache.clear();
    }

    /// Issues the connect and waits up to `timeout` for its outcome
    ///
    /// # Errors
    /// - [`ChannelError::AlreadyConnecting`] if a connect was issued before
    /// - [`ChannelError::ProviderNotRegistered`], [`ChannelError::ChannelCreationFailed`]
    /// - [`ChannelError::ConnectFailed`] on timeout or a non-connected state,
    ///   carrying the last recorded diagnostic
    pub fn connect(
        &self,
        timeout: Duration,
    ) -> Result<()> {
        self.state.ensure_alive()?;
        self.issue_connect()?;
        self.wait_connect(timeout)
    }

    /// Starts a connect attempt without blocking
    pub fn issue_connect(&self) -> Result<()> {
        self.state.ensure_alive()?;
        let client = self.client()?;
        self.state.begin_connect()?;

        let Some(provider) = client.registry().get_provider(&self.provider_name) else {
            return Err(ChannelError::ProviderNotRegistered {
                channel: self.channel_name.clone(),
                provider: self.provider_name.clone(),
            }
            .into());
        };

        let requester: Arc<dyn ChannelRequester> =
            Arc::new(ChannelRequesterImpl::new(&self.channel_name, self.self_ref.clone()));
        debug!(channel = %self.channel_name, provider = %self.provider_name, "createChannel");
        let channel = provider
            .create_channel(&self.channel_name, requester, client.config().channel_priority)
            .ok_or_else(|| ChannelError::ChannelCreationFailed(self.state.connect_status()))?;

        if let Err(e) = self.state.attach_channel(channel.clone()) {
            channel.destroy();
            return Err(e);
        }
        Ok(())
    }

    /// Waits for the outcome of [`issue_connect`](Self::issue_connect)
    pub fn wait_connect(
        &self,
        timeout: Duration,
    ) -> Result<()> {
        self.state.ensure_alive()?;
        self.state.wait_connect(timeout)
    }

    /// Provider-level channel of a connected handle, connecting first if
    /// no attempt was made yet
    fn connected_channel(
        &self,
        operation: &'static str,
    ) -> Result<Arc<dyn Channel>> {
        if self.state.state() != ConnectState::Connected {
            let timeout = self.client()?.config().connect_timeout();
            self.auto_connect(operation, timeout)?;
        }
        if self.state.state() != ConnectState::Connected {
            return Err(ChannelError::ConnectFailed {
                channel: self.channel_name.clone(),
                message: format!("{operation} not connected"),
            }
            .into());
        }
        self.state
            .channel()
            .ok_or_else(|| ChannelError::ChannelCreationFailed(self.state.connect_status()).into())
    }

    /// Issues the connect, or joins the attempt another caller already
    /// issued, and waits for its outcome
    fn auto_connect(
        &self,
        operation: &'static str,
        timeout: Duration,
    ) -> Result<()> {
        match self.issue_connect() {
            Ok(()) => {}
            Err(Error::Channel(ChannelError::AlreadyConnecting { .. })) => {
                trace!(channel = %self.channel_name, operation, "joining connect in flight");
            }
            Err(e) => return Err(e),
        }
        self.wait_connect(timeout)
    }

    fn build_request(
        &self,
        request: &str,
        operation: &'static str,
    ) -> Result<PvRequest> {
        self.create_request.build(request).map_err(|source| {
            ChannelError::InvalidRequest {
                channel: self.channel_name.clone(),
                operation,
                source,
            }
            .into()
        })
    }

    fn construct<E: ?Sized>(
        &self,
        operation: &'static str,
        build: impl FnOnce(&Arc<PvaClient>, &Arc<Self>, &Arc<dyn Channel>) -> Arc<E>,
    ) -> Result<Arc<E>> {
        self.state.ensure_alive()?;
        let channel = self.connected_channel(operation)?;
        let client = self.client()?;
        let this = self.ptr_self()?;
        trace!(channel = %self.channel_name, operation, "constructing endpoint");
        Ok(build(&client, &this, &channel))
    }

    /// Cached endpoints inserted while `destroy` ran are dropped again
    fn reject_if_destroyed<E: ?Sized>(
        &self,
        endpoint: Arc<E>,
    ) -> Result<Arc<E>> {
        if self.state.is_destroyed() {
            self.get_cache.clear();
            self.put_cache.clear();
            return Err(ChannelError::destroyed(&self.channel_name).into());
        }
        Ok(endpoint)
    }

    //-----------------------------------------------------------
    // Read

    pub fn get(&self) -> Result<Arc<dyn ClientGet>> {
        self.get_with(DEFAULT_GET_REQUEST)
    }

    /// Cached, connected read endpoint for `request`
    pub fn get_with(
        &self,
        request: &str,
    ) -> Result<Arc<dyn ClientGet>> {
        self.state.ensure_alive()?;
        let get = self.get_cache.get_or_try_insert_with(request, || {
            let get = self.create_get_with(request)?;
            get.connect()?;
            Ok(get)
        })?;
        self.reject_if_destroyed(get)
    }

    pub fn create_get(&self) -> Result<Arc<dyn ClientGet>> {
        self.create_get_with(DEFAULT_GET_REQUEST)
    }

    /// New, not yet connected read endpoint; bypasses the cache
    pub fn create_get_with(
        &self,
        request: &str,
    ) -> Result<Arc<dyn ClientGet>> {
        self.state.ensure_alive()?;
        let pv_request = self.build_request(request, "createGet")?;
        self.create_get_for(&pv_request)
    }

    pub fn create_get_for(
        &self,
        request: &PvRequest,
    ) -> Result<Arc<dyn ClientGet>> {
        self.construct("createGet", |client, this, channel| {
            client.endpoint_factory().create_get(client, this, channel, request)
        })
    }

    //-----------------------------------------------------------
    // Write

    pub fn put(&self) -> Result<Arc<dyn ClientPut>> {
        self.put_with(DEFAULT_PUT_REQUEST)
    }

    /// Cached write endpoint for `request`, connected and holding the
    /// current value
    pub fn put_with(
        &self,
        request: &str,
    ) -> Result<Arc<dyn ClientPut>> {
        self.state.ensure_alive()?;
        let put = self.put_cache.get_or_try_insert_with(request, || {
            let put = self.create_put_with(request)?;
            put.connect()?;
            put.get()?;
            Ok(put)
        })?;
        self.reject_if_destroyed(put)
    }

    pub fn create_put(&self) -> Result<Arc<dyn ClientPut>> {
        self.create_put_with(DEFAULT_PUT_REQUEST)
    }

    pub fn create_put_with(
        &self,
        request: &str,
    ) -> Result<Arc<dyn ClientPut>> {
        self.state.ensure_alive()?;
        let pv_request = self.build_request(request, "createPut")?;
        self.create_put_for(&pv_request)
    }

    pub fn create_put_for(
        &self,
        request: &PvRequest,
    ) -> Result<Arc<dyn ClientPut>> {
        self.construct("createPut", |client, this, channel| {
            client.endpoint_factory().create_put(client, this, channel, request)
        })
    }

    //-----------------------------------------------------------
    // Monitor

    pub fn monitor(&self) -> Result<Arc<dyn ClientMonitor>> {
        self.monitor_with(DEFAULT_MONITOR_REQUEST)
    }

    /// New monitor, connected and started. Monitors are not cached.
    pub fn monitor_with(
        &self,
        request: &str,
    ) -> Result<Arc<dyn ClientMonitor>> {
        self.state.ensure_alive()?;
        let monitor = self.create_monitor_with(request)?;
        monitor.connect()?;
        monitor.start()?;
        Ok(monitor)
    }

    /// Like [`monitor_with`](Self::monitor_with), delivering events to
    /// `requester`
    pub fn monitor_with_requester(
        &self,
        request: &str,
        requester: Arc<dyn MonitorRequester>,
    ) -> Result<Arc<dyn ClientMonitor>> {
        self.state.ensure_alive()?;
        let monitor = self.create_monitor_with(request)?;
        monitor.connect()?;
        monitor.set_requester(requester);
        monitor.start()?;
        Ok(monitor)
    }

    pub fn create_monitor(&self) -> Result<Arc<dyn ClientMonitor>> {
        self.create_monitor_with(DEFAULT_MONITOR_REQUEST)
    }

    pub fn create_monitor_with(
        &self,
        request: &str,
    ) -> Result<Arc<dyn ClientMonitor>> {
        self.state.ensure_alive()?;
        let pv_request = self.build_request(request, "createMonitor")?;
        self.create_monitor_for(&pv_request)
    }

    pub fn create_monitor_for(
        &self,
        request: &PvRequest,
    ) -> Result<Arc<dyn ClientMonitor>> {
        self.construct("createMonitor", |client, this, channel| {
            client.endpoint_factory().create_monitor(client, this, channel, request)
        })
    }

    //-----------------------------------------------------------
    // Process

    pub fn process(&self) -> Result<Arc<dyn ClientProcess>> {
        self.process_with(DEFAULT_PROCESS_REQUEST)
    }

    /// New, connected process endpoint. Not cached.
    pub fn process_with(
        &self,
        request: &str,
    ) -> Result<Arc<dyn ClientProcess>> {
        self.state.ensure_alive()?;
        let process = self.create_process_with(request)?;
        process.connect()?;
        Ok(process)
    }

    pub fn create_process(&self) -> Result<Arc<dyn ClientProcess>> {
        self.create_process_with(DEFAULT_PROCESS_REQUEST)
    }

    pub fn create_process_with(
        &self,
        request: &str,
    ) -> Result<Arc<dyn ClientProcess>> {
        self.state.ensure_alive()?;
        let pv_request = self.build_request(request, "createProcess")?;
        self.create_process_for(&pv_request)
    }

    pub fn create_process_for(
        &self,
        request: &PvRequest,
    ) -> Result<Arc<dyn ClientProcess>> {
        self.construct("createProcess", |client, this, channel| {
            client.endpoint_factory().create_process(client, this, channel, request)
        })
    }

    //-----------------------------------------------------------
    // Declared, not available in this revision

    pub fn create_put_get(&self) -> Result<Arc<dyn ClientPutGet>> {
        self.create_put_get_with(DEFAULT_PUT_GET_REQUEST)
    }

    pub fn create_put_get_with(
        &self,
        request: &str,
    ) -> Result<Arc<dyn ClientPutGet>> {
        self.state.ensure_alive()?;
        let pv_request = self.build_request(request, "createPutGet")?;
        self.create_put_get_for(&pv_request)
    }

    pub fn create_put_get_for(
        &self,
        _request: &PvRequest,
    ) -> Result<Arc<dyn ClientPutGet>> {
        self.state.ensure_alive()?;
        Err(ChannelError::NotImplemented {
            operation: "PvaClientChannel::createPutGet",
        }
        .into())
    }

    pub fn create_rpc(&self) -> Result<Arc<dyn ClientRpc>> {
        self.create_rpc_with(DEFAULT_RPC_REQUEST)
    }

    pub fn create_rpc_with(
        &self,
        request: &str,
    ) -> Result<Arc<dyn ClientRpc>> {
        self.state.ensure_alive()?;
        let pv_request = self.build_request(request, "createRPC")?;
        self.create_rpc_for(&pv_request)
    }

    pub fn create_rpc_for(
        &self,
        _request: &PvRequest,
    ) -> Result<Arc<dyn ClientRpc>> {
        self.state.ensure_alive()?;
        Err(ChannelError::NotImplemented {
            operation: "PvaClientChannel::createRPC",
        }
        .into())
    }

    pub fn create_array(&self) -> Result<Arc<dyn ClientArray>> {
        self.create_array_with(DEFAULT_ARRAY_REQUEST)
    }

    pub fn create_array_with(
        &self,
        request: &str,
    ) -> Result<Arc<dyn ClientArray>> {
        self.state.ensure_alive()?;
        let pv_request = self.build_request(request, "createArray")?;
        self.create_array_for(&pv_request)
    }

    pub fn create_array_for(
        &self,
        _request: &PvRequest,
    ) -> Result<Arc<dyn ClientArray>> {
        self.state.ensure_alive()?;
        Err(ChannelError::NotImplemented {
            operation: "PvaClientChannel::createArray",
        }
        .into())
    }

    pub fn create_field(&self) -> Result<Arc<dyn ClientField>> {
        self.create_field_with("")
    }

    pub fn create_field_with(
        &self,
        _sub_field: &str,
    ) -> Result<Arc<dyn ClientField>> {
        self.state.ensure_alive()?;
        Err(ChannelError::NotImplemented {
            operation: "PvaClientChannel::createField",
        }
        .into())
    }
}

impl Drop for PvaClientChannel {
    fn drop(&mut self) {
        self.destroy();
    }
}
