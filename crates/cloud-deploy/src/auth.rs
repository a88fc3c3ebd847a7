//! Interactive sign-in against the Microsoft identity platform
//!
//! OAuth 2.0 device authorization grant: the user code is logged, the
//! operator completes sign-in in a browser, and the token endpoint is
//! polled until it hands out an access token or the code expires.

use crate::client::AccessToken;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub const DEFAULT_LOGIN_ENDPOINT: &str = "https://login.microsoftonline.com";

/// Accepts any work or school account
pub const DEFAULT_TENANT: &str = "organizations";

/// Public client id of the Azure CLI, allowed to request management tokens
pub const DEFAULT_CLIENT_ID: &str = "04b07795-8ddb-461a-bbee-02f9e1bf7b46";

pub const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    verification_uri: String,
    expires_in: u64,
    #[serde(default = "default_interval")]
    interval: u64,
    #[serde(default)]
    message: Option<String>,
}

fn default_interval() -> u64 {
    5
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// What the token endpoint said about one poll
#[derive(Debug, PartialEq, Eq)]
enum PollState {
    Pending,
    SlowDown,
    Rejected(String),
}

fn classify(error: &TokenError) -> PollState {
    match error.error.as_str() {
        "authorization_pending" => PollState::Pending,
        "slow_down" => PollState::SlowDown,
        other => PollState::Rejected(match &error.error_description {
            Some(description) => format!("{}: {}", other, description),
            None => other.to_string(),
        }),
    }
}

/// Device-code sign-in for one tenant and client id
pub struct DeviceCodeAuth {
    login_endpoint: String,
    tenant: String,
    client_id: String,
    client: reqwest::Client,
}

impl DeviceCodeAuth {
    pub fn new(login_endpoint: String, tenant: String, client_id: String) -> Self {
        Self {
            login_endpoint: login_endpoint.trim_end_matches('/').to_string(),
            tenant,
            client_id,
            client: reqwest::Client::new(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    fn endpoint(&self, leaf: &str) -> String {
        format!("{}/{}/oauth2/v2.0/{}", self.login_endpoint, self.tenant, leaf)
    }

    /// Run the whole flow; bounded by the device code's own expiry
    pub async fn acquire_token(&self) -> Result<AccessToken> {
        let scope = format!("{} offline_access", MANAGEMENT_SCOPE);
        let response = self
            .client
            .post(self.endpoint("devicecode"))
            .form(&[("client_id", self.client_id.as_str()), ("scope", scope.as_str())])
            .send()
            .await
            .context("Failed to request device code")?;

        if !response.status().is_success() {
            anyhow::bail!("Device code request failed: {}", response.status());
        }

        let code: DeviceCodeResponse = response
            .json()
            .await
            .context("Failed to parse device code response")?;

        match &code.message {
            Some(message) => info!("{}", message),
            None => info!(
                "To sign in, open {} and enter the code {}",
                code.verification_uri, code.user_code
            ),
        }

        let deadline = Instant::now() + Duration::from_secs(code.expires_in);
        let mut interval = Duration::from_secs(code.interval.max(1));

        loop {
            tokio::time::sleep(interval).await;
            if Instant::now() >= deadline {
                anyhow::bail!("Device code expired before sign-in completed");
            }

            let response = self
                .client
                .post(self.endpoint("token"))
                .form(&[
                    ("grant_type", DEVICE_CODE_GRANT),
                    ("client_id", self.client_id.as_str()),
                    ("device_code", code.device_code.as_str()),
                ])
                .send()
                .await
                .context("Failed to poll token endpoint")?;

            if response.status().is_success() {
                let token: TokenResponse = response
                    .json()
                    .await
                    .context("Failed to parse token response")?;
                info!("Signed in to Azure");
                return Ok(AccessToken::new(token.access_token));
            }

            let error: TokenError = response
                .json()
                .await
                .context("Failed to parse token error response")?;
            match classify(&error) {
                PollState::Pending => debug!("Waiting for device sign-in"),
                PollState::SlowDown => {
                    interval += Duration::from_secs(5);
                    warn!("Token endpoint asked to slow down, polling every {:?}", interval);
                }
                PollState::Rejected(reason) => anyhow::bail!("Sign-in failed: {}", reason),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_per_tenant() {
        let auth = DeviceCodeAuth::new(
            "https://login.microsoftonline.com/".to_string(),
            DEFAULT_TENANT.to_string(),
            DEFAULT_CLIENT_ID.to_string(),
        );
        assert_eq!(
            auth.endpoint("devicecode"),
            "https://login.microsoftonline.com/organizations/oauth2/v2.0/devicecode"
        );
        assert_eq!(auth.client_id(), DEFAULT_CLIENT_ID);
    }

    #[test]
    fn test_classify_token_errors() {
        let pending: TokenError = serde_json::from_str(r#"{"error":"authorization_pending"}"#).unwrap();
        assert_eq!(classify(&pending), PollState::Pending);

        let slow: TokenError = serde_json::from_str(r#"{"error":"slow_down"}"#).unwrap();
        assert_eq!(classify(&slow), PollState::SlowDown);

        let declined: TokenError = serde_json::from_str(
            r#"{"error":"authorization_declined","error_description":"user said no"}"#,
        )
        .unwrap();
        assert_eq!(
            classify(&declined),
            PollState::Rejected("authorization_declined: user said no".to_string())
        );
    }

    #[test]
    fn test_device_code_interval_defaults() {
        let code: DeviceCodeResponse = serde_json::from_str(
            r#"{"device_code":"d","user_code":"ABCD","verification_uri":"https://microsoft.com/devicelogin","expires_in":900}"#,
        )
        .unwrap();
        assert_eq!(code.interval, 5);
        assert!(code.message.is_none());
    }
}
