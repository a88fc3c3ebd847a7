//! Azure Resource Manager adapter
//!
//! Talks to the ARM REST API directly with `reqwest`. Create calls that
//! answer `201`/`202` are followed through their `Azure-AsyncOperation`
//! or `Location` header until the operation settles; the orchestrator's
//! per-call timeout bounds the whole poll.

use crate::auth::{DeviceCodeAuth, DEFAULT_CLIENT_ID, DEFAULT_LOGIN_ENDPOINT, DEFAULT_TENANT};
use crate::client::{
    AccessToken, ApplicationHandle, ApplicationSpec, Capability, HostingPlanSpec, ProvisioningClient,
    ProvisioningContext, PublishCredentials, Subscription,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_TYPE, LOCATION, RETRY_AFTER};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";

const SUBSCRIPTIONS_API: &str = "2020-01-01";
const RESOURCE_GROUPS_API: &str = "2021-04-01";
const WEB_API: &str = "2022-03-01";

const ASYNC_OPERATION: &str = "azure-asyncoperation";

/// Connection settings for [`AzureClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureSettings {
    pub enabled: bool,
    pub management_endpoint: String,
    pub login_endpoint: String,
    pub tenant: String,
    pub client_id: String,
    /// Pre-issued management token; skips interactive sign-in
    pub access_token: Option<String>,
    pub poll_interval: Duration,
}

impl Default for AzureSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            management_endpoint: DEFAULT_MANAGEMENT_ENDPOINT.to_string(),
            login_endpoint: DEFAULT_LOGIN_ENDPOINT.to_string(),
            tenant: DEFAULT_TENANT.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            access_token: None,
            poll_interval: Duration::from_secs(5),
        }
    }
}

pub struct AzureClient {
    settings: AzureSettings,
    auth: DeviceCodeAuth,
    client: reqwest::Client,
}

impl AzureClient {
    pub fn new(settings: AzureSettings) -> Self {
        let auth = DeviceCodeAuth::new(
            settings.login_endpoint.clone(),
            settings.tenant.clone(),
            settings.client_id.clone(),
        );
        Self {
            settings,
            auth,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str, api_version: &str) -> String {
        format!(
            "{}{}?api-version={}",
            self.settings.management_endpoint.trim_end_matches('/'),
            path,
            api_version
        )
    }

    async fn get_json(&self, ctx: &ProvisioningContext, url: &str) -> Result<Value> {
        let response = self
            .client
            .get(url)
            .bearer_auth(ctx.token.secret())
            .send()
            .await
            .with_context(|| format!("GET {}", url))?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("GET {} returned {}: {}", url, status, arm_error_message(&text));
        }
        parse_body(&text)
    }

    /// Follow a control-plane response until the operation behind it settles
    async fn complete(
        &self,
        ctx: &ProvisioningContext,
        what: &str,
        response: reqwest::Response,
        resource_url: Option<&str>,
    ) -> Result<Value> {
        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            anyhow::bail!("{} returned {}: {}", what, status, arm_error_message(&text));
        }

        let operation = header(&headers, ASYNC_OPERATION);
        let location = header(&headers, LOCATION.as_str());
        let accepted = status == StatusCode::ACCEPTED || (status == StatusCode::CREATED && operation.is_some());
        if !accepted {
            return parse_body(&text);
        }

        let interval = retry_after(&headers).unwrap_or(self.settings.poll_interval);
        if let Some(operation) = operation {
            self.poll_operation(ctx, what, &operation, interval).await?;
            return match (resource_url, location) {
                (Some(url), _) => self.get_json(ctx, url).await,
                (None, Some(location)) => self.get_json(ctx, &location).await,
                (None, None) => Ok(Value::Null),
            };
        }
        if let Some(location) = location {
            return self.poll_location(ctx, what, &location, interval).await;
        }
        parse_body(&text)
    }

    async fn poll_operation(&self, ctx: &ProvisioningContext, what: &str, url: &str, interval: Duration) -> Result<()> {
        loop {
            tokio::time::sleep(interval).await;
            let body = self.get_json(ctx, url).await?;
            let status = body["status"].as_str().unwrap_or("InProgress");
            debug!("{}: operation {}", what, status);
            match status {
                "Succeeded" => return Ok(()),
                "Failed" | "Canceled" => {
                    let message = body["error"]["message"].as_str().unwrap_or("no details");
                    anyhow::bail!("{} {}: {}", what, status.to_lowercase(), message);
                }
                _ => {}
            }
        }
    }

    async fn poll_location(&self, ctx: &ProvisioningContext, what: &str, url: &str, interval: Duration) -> Result<Value> {
        loop {
            tokio::time::sleep(interval).await;
            let response = self
                .client
                .get(url)
                .bearer_auth(ctx.token.secret())
                .send()
                .await
                .with_context(|| format!("{}: polling {}", what, url))?;
            let status = response.status();
            if status == StatusCode::ACCEPTED {
                debug!("{}: still running", what);
                continue;
            }
            let text = response.text().await.unwrap_or_default();
            if !status.is_success() {
                anyhow::bail!("{} returned {}: {}", what, status, arm_error_message(&text));
            }
            return parse_body(&text);
        }
    }

    async fn put(&self, ctx: &ProvisioningContext, what: &str, path: &str, api_version: &str, body: &Value) -> Result<Value> {
        let url = self.url(path, api_version);
        let response = self
            .client
            .put(&url)
            .bearer_auth(ctx.token.secret())
            .json(body)
            .send()
            .await
            .with_context(|| format!("{}: PUT {}", what, path))?;
        self.complete(ctx, what, response, Some(&url)).await
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    header(headers, RETRY_AFTER.as_str())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn parse_body(text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).context("Failed to parse control-plane response")
}

/// `error.message` of an ARM error body, or the raw text
fn arm_error_message(text: &str) -> String {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|body| body["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| text.chars().take(300).collect())
}

fn resource_group_path(subscription_id: &str, name: &str) -> String {
    format!("/subscriptions/{}/resourceGroups/{}", subscription_id, name)
}

fn web_path(subscription_id: &str, resource_group: &str, kind: &str, name: &str) -> String {
    format!(
        "{}/providers/Microsoft.Web/{}/{}",
        resource_group_path(subscription_id, resource_group),
        kind,
        name
    )
}

fn hosting_plan_body(spec: &HostingPlanSpec) -> Value {
    json!({
        "location": spec.region,
        "kind": "linux",
        "sku": { "name": "F1", "tier": "Free" },
        "properties": { "reserved": true }
    })
}

fn application_body(subscription_id: &str, spec: &ApplicationSpec) -> Value {
    let settings: Vec<Value> = spec
        .app_settings
        .iter()
        .map(|(name, value)| json!({ "name": name, "value": value }))
        .collect();
    json!({
        "location": spec.region,
        "kind": "app,linux",
        "properties": {
            "serverFarmId": web_path(subscription_id, &spec.resource_group, "serverfarms", &spec.plan_name),
            "reserved": true,
            "siteConfig": {
                "linuxFxVersion": spec.runtime,
                "appCommandLine": spec.start_command,
                "appSettings": settings
            }
        }
    })
}

fn logging_body() -> Value {
    json!({
        "properties": {
            "httpLoggingEnabled": true,
            "detailedErrorLoggingEnabled": true,
            "requestTracingEnabled": true,
            "use32BitWorkerProcess": true
        }
    })
}

#[async_trait]
impl ProvisioningClient for AzureClient {
    fn capability(&self) -> Capability {
        if !self.settings.enabled {
            return Capability::Unavailable("Azure deployment is disabled by configuration".to_string());
        }
        if self.settings.access_token.is_none() && self.auth.client_id().trim().is_empty() {
            return Capability::Unavailable("no Azure client id configured for sign-in".to_string());
        }
        Capability::Available
    }

    async fn authenticate(&self) -> Result<AccessToken> {
        if let Some(token) = &self.settings.access_token {
            info!("Using pre-issued Azure access token");
            return Ok(AccessToken::new(token.clone()));
        }
        self.auth.acquire_token().await
    }

    async fn list_subscriptions(&self, token: &AccessToken) -> Result<Vec<Subscription>> {
        let url = self.url("/subscriptions", SUBSCRIPTIONS_API);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token.secret())
            .send()
            .await
            .context("Failed to list subscriptions")?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to list subscriptions: {}", response.status());
        }

        let body: Value = response
            .json()
            .await
            .context("Failed to parse subscription list")?;
        Ok(body["value"]
            .as_array()
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .filter_map(|entry| {
                Some(Subscription {
                    id: entry["subscriptionId"].as_str()?.to_string(),
                    display_name: entry["displayName"].as_str().unwrap_or_default().to_string(),
                })
            })
            .collect())
    }

    async fn create_resource_group(&self, ctx: &ProvisioningContext, name: &str, region: &str) -> Result<()> {
        info!("Creating resource group {} in {}", name, region);
        let path = resource_group_path(&ctx.subscription_id, name);
        self.put(ctx, "create resource group", &path, RESOURCE_GROUPS_API, &json!({ "location": region }))
            .await?;
        Ok(())
    }

    async fn create_hosting_plan(&self, ctx: &ProvisioningContext, spec: &HostingPlanSpec) -> Result<()> {
        info!("Creating App Service plan {}", spec.name);
        let path = web_path(&ctx.subscription_id, &spec.resource_group, "serverfarms", &spec.name);
        self.put(ctx, "create hosting plan", &path, WEB_API, &hosting_plan_body(spec))
            .await?;
        Ok(())
    }

    async fn create_application(&self, ctx: &ProvisioningContext, spec: &ApplicationSpec) -> Result<ApplicationHandle> {
        info!("Creating web app {}", spec.name);
        let path = web_path(&ctx.subscription_id, &spec.resource_group, "sites", &spec.name);
        let site = self
            .put(ctx, "create web app", &path, WEB_API, &application_body(&ctx.subscription_id, spec))
            .await?;
        let default_host_name = site["properties"]["defaultHostName"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}.azurewebsites.net", spec.name));
        Ok(ApplicationHandle { default_host_name })
    }

    async fn configure_logging(&self, ctx: &ProvisioningContext, resource_group: &str, app_name: &str) -> Result<()> {
        let path = format!("{}/config/web", web_path(&ctx.subscription_id, resource_group, "sites", app_name));
        let response = self
            .client
            .patch(self.url(&path, WEB_API))
            .bearer_auth(ctx.token.secret())
            .json(&logging_body())
            .send()
            .await
            .context("Failed to update web app configuration")?;
        self.complete(ctx, "configure logging", response, None).await?;
        Ok(())
    }

    async fn fetch_publish_credentials(
        &self,
        ctx: &ProvisioningContext,
        resource_group: &str,
        app_name: &str,
    ) -> Result<PublishCredentials> {
        let path = format!(
            "{}/config/publishingcredentials/list",
            web_path(&ctx.subscription_id, resource_group, "sites", app_name)
        );
        let response = self
            .client
            .post(self.url(&path, WEB_API))
            .bearer_auth(ctx.token.secret())
            .header(reqwest::header::CONTENT_LENGTH, 0)
            .send()
            .await
            .context("Failed to request publishing credentials")?;
        let body = self.complete(ctx, "fetch publishing credentials", response, None).await?;

        let properties = &body["properties"];
        match (
            properties["publishingUserName"].as_str(),
            properties["publishingPassword"].as_str(),
        ) {
            (Some(username), Some(password)) => Ok(PublishCredentials {
                username: username.to_string(),
                password: password.to_string(),
            }),
            _ => anyhow::bail!("Publishing credentials missing from response"),
        }
    }

    async fn upload_package(&self, endpoint: &str, credentials: &PublishCredentials, package: &[u8]) -> Result<()> {
        let response = self
            .client
            .post(endpoint)
            .basic_auth(&credentials.username, Some(&credentials.password))
            .header(CONTENT_TYPE, "application/zip")
            .body(package.to_vec())
            .send()
            .await
            .context("Zip deploy request failed")?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Zip deploy returned {}: {}", status, text.chars().take(300).collect::<String>());
        }
        info!("Zip deploy accepted with {}", status);
        Ok(())
    }

    async fn probe(&self, url: &str) -> Result<u16> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?;
        Ok(response.status().as_u16())
    }
}
