//! Seams between the orchestrator and the outside world
//!
//! [`ProvisioningClient`] covers the cloud control plane plus the two
//! data-plane calls (package upload, public probe). [`FallbackDeployer`]
//! is the secondary upload mechanism tried once every primary attempt
//! has failed.

use async_trait::async_trait;
use std::fmt;
use std::path::Path;

/// Whether a client can provision at all in this environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    Available,
    Unavailable(String),
}

/// Bearer token for the control plane
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: String,
    pub display_name: String,
}

/// Authenticated scope every resource call runs in
#[derive(Debug, Clone)]
pub struct ProvisioningContext {
    pub token: AccessToken,
    pub subscription_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostingPlanSpec {
    pub resource_group: String,
    pub name: String,
    pub region: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationSpec {
    pub resource_group: String,
    pub name: String,
    pub plan_name: String,
    pub region: String,
    /// Linux runtime stack identifier
    pub runtime: String,
    pub start_command: String,
    pub app_settings: Vec<(String, String)>,
}

/// What the control plane reports back for a created application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationHandle {
    pub default_host_name: String,
}

impl ApplicationHandle {
    pub fn public_url(&self) -> String {
        format!("https://{}", self.default_host_name)
    }

    /// Zip-deploy endpoint on the application's management host
    pub fn upload_endpoint(&self) -> String {
        match self.default_host_name.split_once('.') {
            Some((label, rest)) => format!("https://{}.scm.{}/api/zipdeploy", label, rest),
            None => format!("https://{}.scm.azurewebsites.net/api/zipdeploy", self.default_host_name),
        }
    }
}

/// Time-limited basic-auth credentials for package upload
#[derive(Clone, PartialEq, Eq)]
pub struct PublishCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for PublishCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[async_trait]
pub trait ProvisioningClient: Send + Sync {
    fn capability(&self) -> Capability;

    async fn authenticate(&self) -> anyhow::Result<AccessToken>;

    async fn list_subscriptions(&self, token: &AccessToken) -> anyhow::Result<Vec<Subscription>>;

    /// Create or update; returns once the group exists
    async fn create_resource_group(
        &self,
        ctx: &ProvisioningContext,
        name: &str,
        region: &str,
    ) -> anyhow::Result<()>;

    async fn create_hosting_plan(&self, ctx: &ProvisioningContext, spec: &HostingPlanSpec) -> anyhow::Result<()>;

    async fn create_application(
        &self,
        ctx: &ProvisioningContext,
        spec: &ApplicationSpec,
    ) -> anyhow::Result<ApplicationHandle>;

    /// Turn on HTTP, detailed-error and request-tracing logs for the app
    async fn configure_logging(
        &self,
        ctx: &ProvisioningContext,
        resource_group: &str,
        app_name: &str,
    ) -> anyhow::Result<()>;

    async fn fetch_publish_credentials(
        &self,
        ctx: &ProvisioningContext,
        resource_group: &str,
        app_name: &str,
    ) -> anyhow::Result<PublishCredentials>;

    /// One upload attempt; any non-success response is an error
    async fn upload_package(
        &self,
        endpoint: &str,
        credentials: &PublishCredentials,
        package: &[u8],
    ) -> anyhow::Result<()>;

    /// Unauthenticated GET; returns the status code
    async fn probe(&self, url: &str) -> anyhow::Result<u16>;
}

/// Where the fallback mechanism should push the archive
#[derive(Debug, Clone, Copy)]
pub struct FallbackTarget<'a> {
    pub subscription_id: &'a str,
    pub resource_group: &'a str,
    pub app_name: &'a str,
    pub archive: &'a Path,
}

#[async_trait]
pub trait FallbackDeployer: Send + Sync {
    async fn is_available(&self) -> bool;

    async fn deploy(&self, target: FallbackTarget<'_>) -> anyhow::Result<()>;
}

/// Fallback for environments without a secondary mechanism
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFallback;

#[async_trait]
impl FallbackDeployer for NoFallback {
    async fn is_available(&self) -> bool {
        false
    }

    async fn deploy(&self, _target: FallbackTarget<'_>) -> anyhow::Result<()> {
        anyhow::bail!("no fallback deployment mechanism configured")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_endpoint_from_host_name() {
        let handle = ApplicationHandle {
            default_host_name: "acme1a2b.azurewebsites.net".to_string(),
        };
        assert_eq!(handle.public_url(), "https://acme1a2b.azurewebsites.net");
        assert_eq!(
            handle.upload_endpoint(),
            "https://acme1a2b.scm.azurewebsites.net/api/zipdeploy"
        );
    }

    #[test]
    fn test_secrets_are_not_debug_printed() {
        let credentials = PublishCredentials {
            username: "$acme".to_string(),
            password: "hunter2".to_string(),
        };
        let token = AccessToken::new("eyJ0eXAi");
        assert!(!format!("{:?}", credentials).contains("hunter2"));
        assert!(!format!("{:?}", token).contains("eyJ0eXAi"));
        assert_eq!(token.secret(), "eyJ0eXAi");
    }
}
