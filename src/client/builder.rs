use std::sync::Arc;
use std::time::Duration;

use super::MessageListener;
use super::PvaClient;
use crate::ChannelProviderRegistry;
use crate::ClientConfig;
use crate::EndpointFactory;
use crate::Result;

pub struct PvaClientBuilder {
    config: ClientConfig,
    registry: Arc<dyn ChannelProviderRegistry>,
    endpoint_factory: Arc<dyn EndpointFactory>,
    message_listener: Option<Box<dyn MessageListener>>,
}

impl PvaClientBuilder {
    /// Create a new builder with default config
    pub fn new(
        registry: Arc<dyn ChannelProviderRegistry>,
        endpoint_factory: Arc<dyn EndpointFactory>,
    ) -> Self {
        Self {
            config: ClientConfig::default(),
            registry,
            endpoint_factory,
            message_listener: None,
        }
    }

    /// Set the implicit connect timeout of operation creation (default: 5s)
    ///
    /// Sub-millisecond timeouts round up to 1ms; timeouts beyond `u64::MAX`
    /// milliseconds saturate.
    pub fn connect_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.config.connect_timeout_in_ms = if millis == 0 && !timeout.is_zero() { 1 } else { millis };
        self
    }

    /// Set the provider used by [`PvaClient::default_channel`] (default: "pva")
    pub fn default_provider(
        mut self,
        provider: impl Into<String>,
    ) -> Self {
        self.config.default_provider = provider.into();
        self
    }

    pub fn requester_name(
        mut self,
        name: impl Into<String>,
    ) -> Self {
        self.config.requester_name = name.into();
        self
    }

    /// Set the priority passed on channel creation (default: 0)
    pub fn channel_priority(
        mut self,
        priority: u16,
    ) -> Self {
        self.config.channel_priority = priority;
        self
    }

    pub fn message_listener(
        mut self,
        listener: Box<dyn MessageListener>,
    ) -> Self {
        self.message_listener = Some(listener);
        self
    }

    /// Completely replaces the default configuration
    ///
    /// # Warning: Configuration Override
    /// This discards settings made earlier through individual methods like
    /// [`connect_timeout`](PvaClientBuilder::connect_timeout). Call it first,
    /// or use it instead of them.
    ///
    /// # Example
    /// ```ignore
    /// let config = ClientConfig::new()?.with_override_config("beamline.toml")?;
    /// let client = PvaClient::builder(registry, factory).set_config(config).build()?;
    /// ```
    pub fn set_config(
        mut self,
        config: ClientConfig,
    ) -> Self {
        self.config = config;
        self
    }

    /// Validates the configuration and builds the client
    pub fn build(self) -> Result<Arc<PvaClient>> {
        let config = self.config.validate()?;
        Ok(PvaClient::new(
            config,
            self.registry,
            self.endpoint_factory,
            self.message_listener,
        ))
    }
}
