//! Channel handle.
//!
//! - [`PvaClientChannel`] - facade the application talks to
//! - [`ConnectState`] - connect progress of a handle
//!
//! Internally the handle is split into the connection state machine, the
//! per-kind endpoint caches and the notification sink handed to the
//! engine.

mod pva_channel;
mod request_cache;
mod requester;
mod state;

pub use pva_channel::*;
pub(crate) use request_cache::*;
pub(crate) use requester::*;
pub use state::ConnectState;
pub(crate) use state::ConnectionStateMachine;
pub(crate) use state::StateChange;
