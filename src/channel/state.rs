//! Connection state of a channel handle.
//!
//! Bridges the engine's asynchronous notifications to a blocking
//! [`wait_connect`](ConnectionStateMachine::wait_connect). The state, the
//! last failure diagnostic, the provider-level channel and the destroyed
//! flag share one mutex; waiters park on a condition variable that is
//! notified inside that critical section.

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use parking_lot::Condvar;
use parking_lot::Mutex;
use tracing::debug;
use tracing::trace;

use crate::provider::Channel;
use crate::provider::ConnectionState;
use crate::ChannelError;
use crate::Result;

/// Connect progress of a channel handle
///
/// `Connected` and `NotConnected` end an attempt; a handle leaves `Idle`
/// at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectState {
    Idle,
    ConnectActive,
    Connected,
    NotConnected,
}

/// What a state-change notification did to the handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StateChange {
    /// Handle already destroyed, nothing applied
    Ignored,
    Connected,
    /// Diagnostic recorded as the connection-failure status
    Lost(String),
}

struct Inner {
    connect_state: ConnectState,
    connect_status: String,
    channel: Option<Arc<dyn Channel>>,
    destroyed: bool,
}

pub(crate) struct ConnectionStateMachine {
    channel_name: String,
    inner: Mutex<Inner>,
    state_changed: Condvar,
}

impl ConnectionStateMachine {
    pub(crate) fn new(channel_name: &str) -> Self {
        Self {
            channel_name: channel_name.to_string(),
            inner: Mutex::new(Inner {
                connect_state: ConnectState::Idle,
                connect_status: format!("{channel_name} connect not issued"),
                channel: None,
                destroyed: false,
            }),
            state_changed: Condvar::new(),
        }
    }

    pub(crate) fn state(&self) -> ConnectState {
        self.inner.lock().connect_state
    }

    pub(crate) fn is_destroyed(&self) -> bool {
        self.inner.lock().destroyed
    }

    pub(crate) fn ensure_alive(&self) -> Result<()> {
        if self.is_destroyed() {
            return Err(ChannelError::destroyed(&self.channel_name).into());
        }
        Ok(())
    }

    /// Last recorded connection-failure diagnostic
    pub(crate) fn connect_status(&self) -> String {
        self.inner.lock().connect_status.clone()
    }

    pub(crate) fn channel(&self) -> Option<Arc<dyn Channel>> {
        self.inner.lock().channel.clone()
    }

    /// `Idle` -> `ConnectActive`, pre-recording the creation-failure status
    pub(crate) fn begin_connect(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.destroyed {
            return Err(ChannelError::destroyed(&self.channel_name).into());
        }
        if inner.connect_state != ConnectState::Idle {
            return Err(ChannelError::AlreadyConnecting {
                channel: self.channel_name.clone(),
            }
            .into());
        }
        inner.connect_status = format!("{} createChannel failed", self.channel_name);
        inner.connect_state = ConnectState::ConnectActive;
        debug!(channel = %self.channel_name, "connect issued");
        Ok(())
    }

    /// Stores the provider-level channel; refused once destroyed
    pub(crate) fn attach_channel(
        &self,
        channel: Arc<dyn Channel>,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.destroyed {
            return Err(ChannelError::destroyed(&self.channel_name).into());
        }
        inner.channel = Some(channel);
        Ok(())
    }

    pub(crate) fn apply_state_change(
        &self,
        state: ConnectionState,
    ) -> StateChange {
        let mut inner = self.inner.lock();
        if inner.destroyed {
            trace!(channel = %self.channel_name, %state, "state change after destroy ignored");
            return StateChange::Ignored;
        }
        let waiting_for_connect = inner.connect_state == ConnectState::ConnectActive;

        let change = if state == ConnectionState::Connected {
            inner.connect_state = ConnectState::Connected;
            StateChange::Connected
        } else {
            let message = format!("{} connection state {}", self.channel_name, state);
            inner.connect_status = message.clone();
            inner.connect_state = ConnectState::NotConnected;
            StateChange::Lost(message)
        };
        debug!(channel = %self.channel_name, %state, waiting_for_connect, "state change applied");

        if waiting_for_connect {
            self.state_changed.notify_all();
        }
        change
    }

    /// Blocks until a state change ends the active attempt or `timeout`
    /// elapses. Does not cancel the attempt on timeout.
    pub(crate) fn wait_connect(
        &self,
        timeout: Duration,
    ) -> Result<()> {
        let deadline = Instant::now().checked_add(timeout);
        let mut inner = self.inner.lock();

        while inner.connect_state == ConnectState::ConnectActive && !inner.destroyed {
            match deadline {
                Some(deadline) => {
                    if self.state_changed.wait_until(&mut inner, deadline).timed_out() {
                        debug!(channel = %self.channel_name, ?timeout, "wait for connect timed out");
                        break;
                    }
                }
                None => self.state_changed.wait(&mut inner),
            }
        }

        if inner.destroyed {
            return Err(ChannelError::destroyed(&self.channel_name).into());
        }
        if inner.connect_state == ConnectState::Connected {
            return Ok(());
        }
        Err(ChannelError::ConnectFailed {
            channel: self.channel_name.clone(),
            message: inner.connect_status.clone(),
        }
        .into())
    }

    /// Sets the destroyed flag once and hands back the provider-level channel
    /// for release outside the lock. Parked waiters are woken.
    pub(crate) fn mark_destroyed(&self) -> Result<Option<Arc<dyn Channel>>> {
        let mut inner = self.inner.lock();
        if inner.destroyed {
            return Err(ChannelError::destroyed(&self.channel_name).into());
        }
        inner.destroyed = true;
        let channel = inner.channel.take();
        self.state_changed.notify_all();
        Ok(channel)
    }
}
