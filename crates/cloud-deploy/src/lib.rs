//! Cloud Deploy
//!
//! Pushes a packaged site to Azure App Service: creates a resource group,
//! a free Linux plan and a Python web app, uploads the archive with
//! retries (falling back to the Azure CLI), then probes the public URL.

pub mod auth;
pub mod azure;
pub mod cli;
pub mod client;
pub mod config;
pub mod models;
pub mod naming;
pub mod orchestrator;

pub use azure::{AzureClient, AzureSettings};
pub use cli::AzCliDeployer;
pub use client::{Capability, FallbackDeployer, NoFallback, ProvisioningClient};
pub use config::{DeployConfig, RetryPolicy};
pub use models::{DeploymentJob, DeploymentOutcome, DeploymentStep, JobStatus, LiveDeployment};
pub use naming::ResourceNames;
pub use orchestrator::Orchestrator;
