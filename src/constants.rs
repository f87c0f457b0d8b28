use std::time::Duration;

// -
// Default request strings per operation kind

pub const DEFAULT_GET_REQUEST: &str = "value,alarm,timeStamp";
pub const DEFAULT_PUT_REQUEST: &str = "value";
pub const DEFAULT_MONITOR_REQUEST: &str = "value,alarm,timeStamp";
pub const DEFAULT_PUT_GET_REQUEST: &str = "putField(argument)getField(result)";
pub const DEFAULT_RPC_REQUEST: &str = "";
pub const DEFAULT_ARRAY_REQUEST: &str = "value";
pub const DEFAULT_PROCESS_REQUEST: &str = "";

// -
// Connection

/// Auto-connect timeout used by operation creation on an unconnected channel
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Engine default channel priority
pub const PRIORITY_DEFAULT: u16 = 0;
pub const PRIORITY_MIN: u16 = 0;
pub const PRIORITY_MAX: u16 = 99;

pub const DEFAULT_PROVIDER: &str = "pva";
pub const DEFAULT_REQUESTER_NAME: &str = "pvaClient";
