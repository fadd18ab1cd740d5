//! Session token decoding
//!
//! The web app issues a JSON Web Token. The device session never verifies the
//! signature (the broker does that); it only needs the claims to know which
//! broker to dial and which device tree to talk to.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Claims carried by a session token
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
    /// Device id, e.g. `device_123`
    pub bot: String,

    /// MQTT broker host name
    pub mqtt: String,

    /// Broker virtual host (multi-tenant brokers only)
    pub vhost: Option<String>,
}

impl TokenClaims {
    /// Username presented to the broker
    ///
    /// Brokers with a virtual host expect `vhost:bot`, everything else just
    /// the device id.
    pub fn mqtt_username(&self) -> String {
        match self.vhost.as_deref() {
            Some(vhost) if !vhost.is_empty() => format!("{}:{}", vhost, self.bot),
            _ => self.bot.clone(),
        }
    }
}

/// Decode the claims segment of an encoded session token
///
/// # Examples
///
/// ```
/// use farmbot_core::token::decode_claims;
///
/// // {"bot":"device_7","mqtt":"mqtt.example.com"}
/// let token = "e30.eyJib3QiOiJkZXZpY2VfNyIsIm1xdHQiOiJtcXR0LmV4YW1wbGUuY29tIn0.sig";
/// let claims = decode_claims(token).unwrap();
/// assert_eq!(claims.bot, "device_7");
/// assert_eq!(claims.mqtt, "mqtt.example.com");
/// ```
pub fn decode_claims(token: &str) -> Result<TokenClaims> {
    let mut segments = token.split('.');

    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_header), Some(payload), Some(_signature), None) => payload,
        _ => {
            return Err(Error::MalformedToken(
                "expected three dot-separated segments".into(),
            ));
        }
    };

    // Some issuers keep the base64 padding even though JWT forbids it
    let raw = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| Error::MalformedToken(format!("payload is not base64url: {}", e)))?;

    let claims: TokenClaims = serde_json::from_slice(&raw)?;
    Ok(claims)
}
