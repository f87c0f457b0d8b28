use std::sync::Arc;
use std::sync::Weak;

use tracing::trace;

use super::PvaClientChannel;
use crate::provider::Channel;
use crate::provider::ChannelRequester;
use crate::provider::ConnectionState;
use crate::provider::MessageType;
use crate::provider::Status;
use crate::ChannelError;
use crate::Result;

/// Notification sink handed to the engine; forwards to the channel handle
///
/// Holds the handle weakly so an engine that outlives the handle cannot
/// keep it alive. Notifications for a dropped handle are discarded.
pub(crate) struct ChannelRequesterImpl {
    channel_name: String,
    channel: Weak<PvaClientChannel>,
}

impl ChannelRequesterImpl {
    pub(crate) fn new(
        channel_name: &str,
        channel: Weak<PvaClientChannel>,
    ) -> Self {
        Self {
            channel_name: channel_name.to_string(),
            channel,
        }
    }

    fn handle(&self) -> Result<Arc<PvaClientChannel>> {
        self.channel
            .upgrade()
            .ok_or_else(|| ChannelError::destroyed(&self.channel_name).into())
    }
}

impl ChannelRequester for ChannelRequesterImpl {
    fn channel_created(
        &self,
        status: Status,
        channel: Option<Arc<dyn Channel>>,
    ) {
        match self.handle() {
            Ok(handle) => handle.channel_created(status, channel),
            Err(_) => trace!(channel = %self.channel_name, "channelCreated for dropped handle"),
        }
    }

    fn channel_state_change(
        &self,
        _channel: Arc<dyn Channel>,
        state: ConnectionState,
    ) {
        match self.handle() {
            Ok(handle) => handle.channel_state_change(state),
            Err(_) => trace!(channel = %self.channel_name, %state, "channelStateChange for dropped handle"),
        }
    }

    fn requester_name(&self) -> Result<String> {
        self.handle()?.requester_name()
    }

    fn message(
        &self,
        message: &str,
        message_type: MessageType,
    ) -> Result<()> {
        self.handle()?.message(message, message_type)
    }

    fn destroy(&self) {
        if let Ok(handle) = self.handle() {
            handle.destroy();
        }
    }
}
