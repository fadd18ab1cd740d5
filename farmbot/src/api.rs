//! Web app REST client
//!
//! Only token issuance is needed to drive a device: the session token both
//! authorizes the broker connection and names the broker to dial.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use farmbot_core::constants::TOKEN_PATH;
use farmbot_types::Credentials;

use crate::app::TokenIssuer;
use crate::error::{Error, Result};

/// Request timeout for the token endpoint
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct TokenRequest<'a> {
    user: UserCredentials<'a>,
}

#[derive(Serialize)]
struct UserCredentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: IssuedToken,
}

#[derive(Deserialize)]
struct IssuedToken {
    encoded: String,
}

/// Exchanges account credentials for a session token
#[derive(Debug, Clone)]
pub struct TokenClient {
    http: reqwest::Client,
    endpoint: String,
}

impl TokenClient {
    /// Create a client for the given web app, e.g. `https://my.farm.bot`
    pub fn new(server: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            endpoint: format!("{}{}", server.trim_end_matches('/'), TOKEN_PATH),
        })
    }

    /// Full URL of the token endpoint
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Request a new session token
    ///
    /// Performs exactly one `POST`; transport errors, non-2xx statuses and
    /// unexpected bodies are returned as-is, never retried.
    pub async fn create_token(&self, credentials: &Credentials) -> Result<String> {
        debug!("Requesting token from {}", self.endpoint);

        let payload = TokenRequest {
            user: UserCredentials {
                email: credentials.email(),
                password: credentials.password(),
            },
        };

        let response: TokenResponse = self
            .http
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let token = response.token.encoded;
        if token.is_empty() {
            return Err(Error::InvalidResponse("token.encoded is empty".into()));
        }

        info!("GOT TOKEN ({} bytes)", token.len());
        debug!("Token: {}", token);

        Ok(token)
    }
}

#[async_trait]
impl TokenIssuer for TokenClient {
    async fn create_token(&self, credentials: &Credentials) -> Result<String> {
        TokenClient::create_token(self, credentials).await
    }
}
