//! Azure CLI as the secondary upload path

use crate::client::{FallbackDeployer, FallbackTarget};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{info, warn};

/// Deploys with `az webapp deployment source config-zip`
#[derive(Debug, Clone)]
pub struct AzCliDeployer {
    program: String,
}

impl Default for AzCliDeployer {
    fn default() -> Self {
        Self::new("az")
    }
}

impl AzCliDeployer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn deploy_args(target: &FallbackTarget<'_>) -> Vec<String> {
        vec![
            "webapp".to_string(),
            "deployment".to_string(),
            "source".to_string(),
            "config-zip".to_string(),
            "--resource-group".to_string(),
            target.resource_group.to_string(),
            "--name".to_string(),
            target.app_name.to_string(),
            "--src".to_string(),
            target.archive.display().to_string(),
            "--subscription".to_string(),
            target.subscription_id.to_string(),
        ]
    }
}

#[async_trait]
impl FallbackDeployer for AzCliDeployer {
    async fn is_available(&self) -> bool {
        let status = Command::new(&self.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await;
        match status {
            Ok(status) if status.success() => true,
            Ok(status) => {
                warn!("{} --version exited with {}", self.program, status);
                false
            }
            Err(e) => {
                info!("{} not found: {}", self.program, e);
                false
            }
        }
    }

    async fn deploy(&self, target: FallbackTarget<'_>) -> Result<()> {
        info!(
            "Deploying {} to {} with {}",
            target.archive.display(),
            target.app_name,
            self.program
        );
        let output = Command::new(&self.program)
            .args(Self::deploy_args(&target))
            .env("AZURE_SUBSCRIPTION_ID", target.subscription_id)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("{} exited with {}: {}", self.program, output.status, stderr.trim());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn target(archive: &Path) -> FallbackTarget<'_> {
        FallbackTarget {
            subscription_id: "sub-1",
            resource_group: "acme-rg",
            app_name: "acme",
            archive,
        }
    }

    #[test]
    fn test_deploy_args() {
        let args = AzCliDeployer::deploy_args(&target(Path::new("/tmp/acme.zip")));
        assert_eq!(
            args.join(" "),
            "webapp deployment source config-zip --resource-group acme-rg --name acme --src /tmp/acme.zip --subscription sub-1"
        );
    }

    #[tokio::test]
    async fn test_missing_program_is_unavailable() {
        let cli = AzCliDeployer::new("forge-test-no-such-program");
        assert!(!cli.is_available().await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_status_decides_outcome() {
        let archive = Path::new("/tmp/acme.zip");
        assert!(AzCliDeployer::new("true").deploy(target(archive)).await.is_ok());

        let err = AzCliDeployer::new("false").deploy(target(archive)).await.unwrap_err();
        assert!(err.to_string().contains("exited with"));
    }
}
