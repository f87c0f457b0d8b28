//! Boundary to the protocol engine.
//!
//! The engine owns the wire protocol and the channel objects themselves;
//! this crate only sees it through the traits below. Notifications flow
//! back into the client through a [`ChannelRequester`] registered at
//! channel creation time and may be delivered from any thread.

use std::fmt;
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

use crate::Result;

/// Connection states reported by the engine for a provider-level channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    NeverConnected,
    Connected,
    Disconnected,
    Destroyed,
}

impl ConnectionState {
    /// Engine label of the state, used in diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionState::NeverConnected => "NEVER_CONNECTED",
            ConnectionState::Connected => "CONNECTED",
            ConnectionState::Disconnected => "DISCONNECTED",
            ConnectionState::Destroyed => "DESTROYED",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusType {
    Ok,
    Warning,
    Error,
    Fatal,
}

/// Completion status attached to asynchronous engine notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub status_type: StatusType,
    pub message: String,
}

impl Status {
    pub fn ok() -> Self {
        Self {
            status_type: StatusType::Ok,
            message: String::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status_type: StatusType::Error,
            message: message.into(),
        }
    }

    /// Warnings still count as success, as they do in the engine
    pub fn is_ok(&self) -> bool {
        matches!(self.status_type, StatusType::Ok | StatusType::Warning)
    }
}

/// Severity of messages surfaced to the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Info,
    Warning,
    Error,
    Fatal,
}

/// Provider-level channel object, owned by the engine
#[cfg_attr(test, automock)]
pub trait Channel: Send + Sync + 'static {
    fn channel_name(&self) -> String;

    /// Releases the engine resources behind the channel
    fn destroy(&self);
}

/// Notification sink registered with the engine when a channel is created
///
/// The engine calls `channel_created` exactly once per creation attempt and
/// `channel_state_change` whenever the underlying connection transitions.
#[cfg_attr(test, automock)]
pub trait ChannelRequester: Send + Sync + 'static {
    fn channel_created(
        &self,
        status: Status,
        channel: Option<Arc<dyn Channel>>,
    );

    fn channel_state_change(
        &self,
        channel: Arc<dyn Channel>,
        state: ConnectionState,
    );

    /// Name used by the engine in its own diagnostics
    fn requester_name(&self) -> Result<String>;

    fn message(
        &self,
        message: &str,
        message_type: MessageType,
    ) -> Result<()>;

    fn destroy(&self);
}

#[cfg_attr(test, automock)]
pub trait ChannelProvider: Send + Sync + 'static {
    fn provider_name(&self) -> String;

    /// Requests creation of a channel. Returns `None` when the engine could
    /// not even start the attempt; otherwise the outcome is reported through
    /// `requester`.
    fn create_channel(
        &self,
        channel_name: &str,
        requester: Arc<dyn ChannelRequester>,
        priority: u16,
    ) -> Option<Arc<dyn Channel>>;
}

/// Narrow service-locator over the process-wide provider registry
#[cfg_attr(test, automock)]
pub trait ChannelProviderRegistry: Send + Sync + 'static {
    fn get_provider(
        &self,
        provider_name: &str,
    ) -> Option<Arc<dyn ChannelProvider>>;
}
