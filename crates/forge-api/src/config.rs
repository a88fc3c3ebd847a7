//! Configuration management for the forge API
//!
//! Loads configuration from environment variables with sensible defaults.

use anyhow::{Context, Result};
use cloud_deploy::{AzureSettings, DeployConfig};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Font directories searched when `FONT_DIRS` is unset
pub const DEFAULT_FONT_DIRS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu",
    "/usr/share/fonts/TTF",
    "/usr/share/fonts/truetype/msttcorefonts",
    "/Library/Fonts",
    "/System/Library/Fonts/Supplemental",
    "C:\\Windows\\Fonts",
];

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server host
    pub api_host: String,

    /// API server port
    pub api_port: u16,

    /// Generic site template every package starts from
    pub template_dir: PathBuf,

    /// Where to look for a font for placeholder logos
    pub font_dirs: Vec<PathBuf>,

    /// Largest accepted form submission
    pub max_upload_bytes: usize,

    /// Try the Azure CLI when direct uploads keep failing
    pub cli_fallback: bool,

    pub azure: AzureSettings,
    pub deploy: DeployConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = DeployConfig::default();
        let azure_defaults = AzureSettings::default();

        let config = Config {
            api_host: var("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            api_port: parse(&var, "API_PORT", 8090)?,
            template_dir: var("TEMPLATE_DIR").unwrap_or_else(|| "./us".to_string()).into(),
            font_dirs: match var("FONT_DIRS") {
                Some(dirs) => env::split_paths(&dirs).collect(),
                None => DEFAULT_FONT_DIRS.iter().map(PathBuf::from).collect(),
            },
            max_upload_bytes: parse(&var, "MAX_UPLOAD_MB", 16usize)? * 1024 * 1024,
            cli_fallback: parse(&var, "DEPLOY_CLI_FALLBACK", true)?,

            azure: AzureSettings {
                enabled: parse(&var, "AZURE_DEPLOY_ENABLED", azure_defaults.enabled)?,
                management_endpoint: var("AZURE_MANAGEMENT_ENDPOINT")
                    .unwrap_or(azure_defaults.management_endpoint),
                login_endpoint: var("AZURE_LOGIN_ENDPOINT").unwrap_or(azure_defaults.login_endpoint),
                tenant: var("AZURE_TENANT_ID").unwrap_or(azure_defaults.tenant),
                client_id: var("AZURE_CLIENT_ID").unwrap_or(azure_defaults.client_id),
                access_token: var("AZURE_ACCESS_TOKEN"),
                poll_interval: secs(&var, "AZURE_POLL_INTERVAL_SECS", azure_defaults.poll_interval)?,
            },

            deploy: DeployConfig {
                region: var("DEPLOY_REGION").unwrap_or(defaults.region),
                subscription_override: var("AZURE_SUBSCRIPTION_ID"),
                retry: cloud_deploy::RetryPolicy {
                    max_attempts: parse(&var, "DEPLOY_MAX_ATTEMPTS", defaults.retry.max_attempts)?,
                    base_delay: secs(&var, "DEPLOY_BASE_DELAY_SECS", defaults.retry.base_delay)?,
                    growth_factor: parse(&var, "DEPLOY_BACKOFF_FACTOR", defaults.retry.growth_factor)?,
                },
                warm_up: secs(&var, "DEPLOY_WARM_UP_SECS", defaults.warm_up)?,
                settle_delay: secs(&var, "DEPLOY_SETTLE_SECS", defaults.settle_delay)?,
                auth_timeout: secs(&var, "DEPLOY_AUTH_TIMEOUT_SECS", defaults.auth_timeout)?,
                control_plane_timeout: secs(
                    &var,
                    "DEPLOY_CONTROL_PLANE_TIMEOUT_SECS",
                    defaults.control_plane_timeout,
                )?,
                upload_timeout: secs(&var, "DEPLOY_UPLOAD_TIMEOUT_SECS", defaults.upload_timeout)?,
                fallback_timeout: secs(&var, "DEPLOY_FALLBACK_TIMEOUT_SECS", defaults.fallback_timeout)?,
                probe_timeout: secs(&var, "DEPLOY_PROBE_TIMEOUT_SECS", defaults.probe_timeout)?,
            },
        };

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.api_port == 0 {
            anyhow::bail!("API_PORT must be greater than 0");
        }

        if self.max_upload_bytes == 0 {
            anyhow::bail!("MAX_UPLOAD_MB must be greater than 0");
        }

        self.deploy
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid deployment settings: {}", e))?;

        Ok(())
    }

    /// Get the API server address
    pub fn api_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }

    /// Warn about a missing template early; requests would fail otherwise
    pub fn check_template(&self) {
        if !self.template_dir.is_dir() {
            tracing::warn!(
                "Template directory does not exist: {}",
                self.template_dir.display()
            );
        }
    }
}

fn parse<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}", key)),
        None => Ok(default),
    }
}

fn secs(var: &impl Fn(&str) -> Option<String>, key: &str, default: Duration) -> Result<Duration> {
    match var(key) {
        Some(value) => {
            let seconds: f64 = value.trim().parse().with_context(|| format!("Invalid {}", key))?;
            if !seconds.is_finite() || seconds < 0.0 {
                anyhow::bail!("{} must be a non-negative number of seconds", key);
            }
            Ok(Duration::from_secs_f64(seconds))
        }
        None => Ok(default),
    }
}
