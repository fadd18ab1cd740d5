//! CeleryScript RPC messages
//!
//! FarmBot devices execute CeleryScript, a JSON AST. Every node has a `kind`
//! and an `args` object, and may carry a `body` of child nodes. Clients wrap
//! commands in an `rpc_request`; the device answers with `rpc_ok` or
//! `rpc_error` carrying the same label.
//!
//! ```text
//! {"kind":"rpc_request",
//!  "args":{"label":"<uuid>","priority":600},
//!  "body":[{"kind":"move_relative","args":{"x":0,"y":0,"z":1,"speed":100}}]}
//! ```

use serde::{Deserialize, Serialize};

use farmbot_types::Offset;

use crate::constants::RPC_PRIORITY;
use crate::error::Result;

const RPC_REQUEST: &str = "rpc_request";

/// Commands understood by the device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "args", rename_all = "snake_case")]
pub enum Command {
    /// Offset the current position by a vector
    MoveRelative { x: f64, y: f64, z: f64, speed: u32 },
}

impl Command {
    pub fn move_relative(offset: Offset, speed: u32) -> Self {
        Self::MoveRelative {
            x: offset.x,
            y: offset.y,
            z: offset.z,
            speed,
        }
    }

    /// CeleryScript node kind
    pub fn name(&self) -> &'static str {
        match self {
            Self::MoveRelative { .. } => "move_relative",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestArgs {
    pub label: String,
    pub priority: u32,
}

/// Client to device RPC envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    kind: String,
    args: RequestArgs,
    body: Vec<Command>,
}

impl RpcRequest {
    /// Wrap commands in a request with the given label
    pub fn new(label: impl Into<String>, body: Vec<Command>) -> Self {
        Self {
            kind: RPC_REQUEST.to_string(),
            args: RequestArgs {
                label: label.into(),
                priority: RPC_PRIORITY,
            },
            body,
        }
    }

    pub fn label(&self) -> &str {
        &self.args.label
    }

    pub fn priority(&self) -> u32 {
        self.args.priority
    }

    pub fn body(&self) -> &[Command] {
        &self.body
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(raw: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(raw)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyArgs {
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplanationArgs {
    pub message: String,
}

/// `explanation` node attached to an `rpc_error`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Explanation {
    #[serde(default = "Explanation::kind")]
    kind: String,
    pub args: ExplanationArgs,
}

impl Explanation {
    fn kind() -> String {
        "explanation".to_string()
    }

    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: Self::kind(),
            args: ExplanationArgs {
                message: message.into(),
            },
        }
    }
}

/// Device to client RPC reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RpcReply {
    RpcOk {
        args: ReplyArgs,
    },
    RpcError {
        args: ReplyArgs,
        #[serde(default)]
        body: Vec<Explanation>,
    },
}

impl RpcReply {
    pub fn ok(label: impl Into<String>) -> Self {
        Self::RpcOk {
            args: ReplyArgs {
                label: label.into(),
            },
        }
    }

    pub fn error(label: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RpcError {
            args: ReplyArgs {
                label: label.into(),
            },
            body: vec![Explanation::new(message)],
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::RpcOk { args } | Self::RpcError { args, .. } => &args.label,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::RpcOk { .. })
    }

    /// Explanations of an `rpc_error`, joined; `None` for `rpc_ok`
    pub fn message(&self) -> Option<String> {
        match self {
            Self::RpcOk { .. } => None,
            Self::RpcError { body, .. } if body.is_empty() => Some("unknown error".to_string()),
            Self::RpcError { body, .. } => Some(
                body.iter()
                    .map(|e| e.args.message.as_str())
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(raw: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    #[test]
    fn test_move_relative_wire_shape() {
        let request = RpcRequest::new(
            "abc",
            vec![Command::move_relative(Offset::z(1.0), 100)],
        );
        let value: Value = serde_json::from_slice(&request.encode().unwrap()).unwrap();

        assert_eq!(
            value,
            json!({
                "kind": "rpc_request",
                "args": {"label": "abc", "priority": 600},
                "body": [
                    {"kind": "move_relative", "args": {"x": 0.0, "y": 0.0, "z": 1.0, "speed": 100}}
                ]
            })
        );
    }

    #[test]
    fn test_request_decode() {
        let raw = concat!(
            r#"{"kind":"rpc_request","args":{"label":"l1","priority":600},"#,
            r#""body":[{"kind":"move_relative","args":{"x":0,"y":0,"z":-1,"speed":100}}]}"#,
        );
        let request = RpcRequest::decode(raw.as_bytes()).unwrap();

        assert_eq!(request.label(), "l1");
        assert_eq!(request.priority(), 600);
        assert_eq!(
            request.body(),
            &[Command::move_relative(Offset::z(-1.0), 100)]
        );
        assert_eq!(request.body()[0].name(), "move_relative");
    }

    #[test]
    fn test_reply_ok() {
        let reply = RpcReply::decode(br#"{"kind":"rpc_ok","args":{"label":"l1"}}"#).unwrap();
        assert!(reply.is_ok());
        assert_eq!(reply.label(), "l1");
        assert_eq!(reply.message(), None);
    }

    #[test]
    fn test_reply_error_joins_explanations() {
        let raw = br#"{"kind":"rpc_error","args":{"label":"l2"},"body":[
            {"kind":"explanation","args":{"message":"Movement out of bounds"}},
            {"kind":"explanation","args":{"message":"Z axis stalled"}}]}"#;
        let reply = RpcReply::decode(raw).unwrap();

        assert!(!reply.is_ok());
        assert_eq!(reply.label(), "l2");
        assert_eq!(
            reply.message().as_deref(),
            Some("Movement out of bounds; Z axis stalled")
        );
    }

    #[test]
    fn test_reply_error_without_body() {
        let reply = RpcReply::decode(br#"{"kind":"rpc_error","args":{"label":"l3"}}"#).unwrap();
        assert_eq!(reply.message().as_deref(), Some("unknown error"));
    }

    #[test]
    fn test_reply_error_encode() {
        let value: Value =
            serde_json::from_slice(&RpcReply::error("l4", "nope").encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "kind": "rpc_error",
                "args": {"label": "l4"},
                "body": [{"kind": "explanation", "args": {"message": "nope"}}]
            })
        );
    }

    #[test]
    fn test_unknown_reply_kind_rejected() {
        assert!(RpcReply::decode(br#"{"kind":"sync","args":{}}"#).is_err());
        assert!(RpcReply::decode(b"not json").is_err());
    }
}
