//! MQTT topic names
//!
//! Every device gets its own tree under `bot/<device id>/`.

/// Topics for a single device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    /// Client to device RPC requests
    pub from_clients: String,

    /// Device to client RPC replies
    pub from_device: String,
}

impl Topics {
    pub fn for_bot(bot: &str) -> Self {
        Self {
            from_clients: format!("bot/{bot}/from_clients"),
            from_device: format!("bot/{bot}/from_device"),
        }
    }
}
