mod channel;
mod client;
mod config;
pub mod constants;
mod endpoint;
mod errors;
mod provider;
mod request;

pub use channel::ConnectState;
pub use channel::PvaClientChannel;
pub use client::*;
pub use config::*;
pub use endpoint::*;
pub use errors::*;
pub use provider::*;
pub use request::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub(crate) mod test_utils;
