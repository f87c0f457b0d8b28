//! Owning client
//!
//! [`PvaClient`] holds what every channel handle shares: the provider
//! registry, the endpoint factory, the configuration and the application's
//! message sink. Handles keep only a weak reference back to it.
//!
//! # Basic Usage
//! ```ignore
//! use std::time::Duration;
//! use pva_client::PvaClient;
//!
//! let client = PvaClient::builder(registry, endpoint_factory)
//!     .connect_timeout(Duration::from_secs(2))
//!     .build()?;
//!
//! let channel = client.channel("sim:counter", "pva");
//! let get = channel.get()?;
//! let put = channel.put_with("value")?;
//! ```

mod builder;

pub use builder::*;


use std::sync::Arc;

use arc_swap::ArcSwapOption;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
#[cfg(test)]
use mockall::automock;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::ChannelProviderRegistry;
use crate::ClientConfig;
use crate::EndpointFactory;
use crate::MessageType;
use crate::PvaClientChannel;

/// Application sink for messages raised by channels and the engine
#[cfg_attr(test, automock)]
pub trait MessageListener: Send + Sync + 'static {
    fn message(
        &self,
        message: &str,
        message_type: MessageType,
    );
}

/// Channel cache key: (channel name, provider name)
type ChannelKey = (String, String);

/// Main entry point: creates channel handles and routes their messages
///
/// Created through [`builder()`](PvaClient::builder). Dropping the client
/// destroys the channels it cached; handles obtained through
/// [`create_channel`](PvaClient::create_channel) outlive it but fail with
/// [`ChannelError::OwningClientGone`](crate::ChannelError::OwningClientGone)
/// where they need it.
pub struct PvaClient {
    config: ClientConfig,
    registry: Arc<dyn ChannelProviderRegistry>,
    endpoint_factory: Arc<dyn EndpointFactory>,
    listener: ArcSwapOption<Box<dyn MessageListener>>,
    channels: DashMap<ChannelKey, Arc<PvaClientChannel>>,
}

impl PvaClient {
    /// Create a configured client builder
    pub fn builder(
        registry: Arc<dyn ChannelProviderRegistry>,
        endpoint_factory: Arc<dyn EndpointFactory>,
    ) -> PvaClientBuilder {
        PvaClientBuilder::new(registry, endpoint_factory)
    }

    pub(crate) fn new(
        config: ClientConfig,
        registry: Arc<dyn ChannelProviderRegistry>,
        endpoint_factory: Arc<dyn EndpointFactory>,
        listener: Option<Box<dyn MessageListener>>,
    ) -> Arc<Self> {
        info!(requester = %config.requester_name, provider = %config.default_provider, "PvaClient created");
        Arc::new(Self {
            config,
            registry,
            endpoint_factory,
            listener: ArcSwapOption::new(listener.map(Arc::new)),
            channels: DashMap::new(),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn requester_name(&self) -> String {
        self.config.requester_name.clone()
    }

    pub(crate) fn registry(&self) -> &Arc<dyn ChannelProviderRegistry> {
        &self.registry
    }

    pub(crate) fn endpoint_factory(&self) -> &Arc<dyn EndpointFactory> {
        &self.endpoint_factory
    }

    /// Replaces the message sink; `None` routes messages to `tracing`
    pub fn set_message_listener(
        &self,
        listener: Option<Box<dyn MessageListener>>,
    ) {
        self.listener.store(listener.map(Arc::new));
    }

    /// Delivers a message to the installed listener, or logs it at the
    /// level matching `message_type`
    pub fn message(
        &self,
        message: &str,
        message_type: MessageType,
    ) {
        if let Some(listener) = self.listener.load_full() {
            listener.message(message, message_type);
            return;
        }
        match message_type {
            MessageType::Info => info!("{}", message),
            MessageType::Warning => warn!("{}", message),
            MessageType::Error | MessageType::Fatal => error!(?message_type, "{}", message),
        }
    }

    /// Cached handle for `channel_name` on `provider_name`
    ///
    /// The handle is not connected; operations connect it on first use. A
    /// cached handle that was destroyed is replaced by a fresh one.
    pub fn channel(
        self: &Arc<Self>,
        channel_name: &str,
        provider_name: &str,
    ) -> Arc<PvaClientChannel> {
        let key = (channel_name.to_string(), provider_name.to_string());
        match self.channels.entry(key) {
            Entry::Occupied(mut entry) => {
                if !entry.get().is_destroyed() {
                    return entry.get().clone();
                }
                debug!(channel = channel_name, provider = provider_name, "replacing destroyed cached channel");
                let channel = PvaClientChannel::create(self, channel_name, provider_name);
                entry.insert(channel.clone());
                channel
            }
            Entry::Vacant(entry) => {
                let channel = PvaClientChannel::create(self, channel_name, provider_name);
                entry.insert(channel.clone());
                channel
            }
        }
    }

    /// [`channel`](Self::channel) on the configured default provider
    pub fn default_channel(
        self: &Arc<Self>,
        channel_name: &str,
    ) -> Arc<PvaClientChannel> {
        let provider = self.config.default_provider.clone();
        self.channel(channel_name, &provider)
    }

    /// Fresh handle that is not cached by the client
    pub fn create_channel(
        self: &Arc<Self>,
        channel_name: &str,
        provider_name: &str,
    ) -> Arc<PvaClientChannel> {
        PvaClientChannel::create(self, channel_name, provider_name)
    }

    pub fn cached_channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Destroys every cached channel and empties the cache
    pub fn destroy(&self) {
        let keys: Vec<ChannelKey> = self.channels.iter().map(|entry| entry.key().clone()).collect();
        if !keys.is_empty() {
            debug!(count = keys.len(), "destroying cached channels");
        }
        for key in keys {
            if let Some((_, channel)) = self.channels.remove(&key) {
                channel.destroy();
            }
        }
    }
}

impl Drop for PvaClient {
    fn drop(&mut self) {
        self.destroy();
    }
}
