//! Protocol constants

/// Web app used when `FARMBOT_SERVER` is not set
pub const DEFAULT_SERVER: &str = "https://my.farm.bot";

/// Token issuance endpoint, relative to the server URL
pub const TOKEN_PATH: &str = "/api/tokens";

/// Plain MQTT port of the message broker
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// MQTT keep-alive (seconds)
pub const DEFAULT_KEEP_ALIVE: u64 = 30;

/// Broker connect timeout (seconds)
pub const DEFAULT_CONNECT_TIMEOUT: u64 = 10;

/// Time to wait for an rpc_ok / rpc_error (milliseconds)
pub const DEFAULT_RPC_TIMEOUT_MS: u64 = 30_000;

/// Period of the demo motion loop (milliseconds)
pub const DEFAULT_LOOP_INTERVAL_MS: u64 = 3_000;

/// Priority attached to every rpc_request
pub const RPC_PRIORITY: u32 = 600;

/// Movement speed, percent of the configured max speed
pub const DEFAULT_SPEED: u32 = 100;
