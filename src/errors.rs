//! pvAccess Client Channel Error Hierarchy
//!
//! Errors are grouped by the layer that raises them: the channel handle
//! (connection lifecycle and operation creation), the request descriptor
//! builder, and configuration loading.

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Channel handle lifecycle and operation creation failures
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// Request string could not be turned into a descriptor
    #[error(transparent)]
    Request(#[from] RequestError),

    /// Configuration source loading or deserialization failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Configuration values rejected by validation
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Failure reported by an endpoint's own connect/activate step
    #[error("Endpoint error: {0}")]
    Endpoint(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Any call on a handle after `destroy()`
    #[error("channel {channel} was destroyed")]
    HandleDestroyed { channel: String },

    /// `connect` issued on a handle that already left `Idle`
    #[error("channel {channel} already connected")]
    AlreadyConnecting { channel: String },

    /// Provider name could not be resolved in the registry
    #[error("{channel} provider {provider} not registered")]
    ProviderNotRegistered { channel: String, provider: String },

    /// The provider returned no channel object
    #[error("{0}")]
    ChannelCreationFailed(String),

    /// Connect attempt timed out or ended in a non-connected state
    #[error("channel {channel} connect failed: {message}")]
    ConnectFailed { channel: String, message: String },

    /// Descriptor builder rejected the request string
    #[error("channel {channel} {operation} invalid pvRequest: {source}")]
    InvalidRequest {
        channel: String,
        operation: &'static str,
        #[source]
        source: RequestError,
    },

    /// Operation kind declared but not available in this revision
    #[error("{operation} not implemented")]
    NotImplemented { operation: &'static str },

    /// Weak back-reference to the owning client no longer resolves
    #[error("PvaClient was destroyed")]
    OwningClientGone,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("unbalanced '{open}' at offset {offset}")]
    Unbalanced { open: char, offset: usize },

    #[error("empty field name at offset {offset}")]
    EmptyFieldName { offset: usize },

    #[error("illegal character '{found}' at offset {offset}")]
    IllegalCharacter { found: char, offset: usize },

    #[error("duplicate section {0}")]
    DuplicateSection(String),

    #[error("unknown section {0}")]
    UnknownSection(String),

    #[error("option '{0}' is missing '='")]
    MalformedOption(String),
}

impl ChannelError {
    pub(crate) fn destroyed(channel: &str) -> Self {
        ChannelError::HandleDestroyed {
            channel: channel.to_string(),
        }
    }
}

impl Error {
    /// True for the handle-destroyed condition, whichever method raised it
    pub fn is_destroyed(&self) -> bool {
        matches!(self, Error::Channel(ChannelError::HandleDestroyed { .. }))
    }

    /// True for operation kinds that are declared but not available yet
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, Error::Channel(ChannelError::NotImplemented { .. }))
    }
}
