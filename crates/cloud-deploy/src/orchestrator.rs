//! Cloud provisioning orchestrator
//!
//! Runs one job strictly in order:
//! `AUTHENTICATE → RESOLVE_SUBSCRIPTION → CREATE_RESOURCE_GROUP →
//! CREATE_HOSTING_PLAN → CREATE_APPLICATION → FETCH_CREDENTIALS →
//! UPLOAD_PACKAGE → [CLI_UPLOAD] → VERIFY`.
//!
//! Any failure is terminal except a failed upload loop, which falls
//! through to the [`FallbackDeployer`] when one is available. Resources
//! created before a failure are not rolled back; they are recorded on the
//! job and logged for manual cleanup. Every remote call runs under its own
//! timeout.

use crate::client::{
    ApplicationSpec, Capability, FallbackDeployer, FallbackTarget, HostingPlanSpec, ProvisioningClient,
    ProvisioningContext,
};
use crate::config::DeployConfig;
use crate::models::{DeploymentJob, DeploymentStep, FailureKind};
use crate::naming::ResourceNames;
use forge_common::layout::{connection_string_from_env, CONNECTION_STRING_KEY, ENTRY_POINT_FILE, ENV_FILE};
use forge_common::request::DEFAULT_CONNECTION_STRING;
use std::fs;
use std::future::Future;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Linux runtime stack the application runs on
pub const PYTHON_RUNTIME: &str = "PYTHON|3.9";

/// Process start command, relative to the archive root
pub const START_COMMAND: &str = "gunicorn --bind=0.0.0.0 --timeout 600 wsgi:app";

/// What the orchestrator needs from the archive itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFacts {
    pub connection_string: String,
    pub bytes: Vec<u8>,
}

/// Check the upload contract without touching the network
pub fn inspect_archive(path: &Path) -> Result<ArchiveFacts, String> {
    if !path.is_file() {
        return Err(format!("package {} does not exist", path.display()));
    }
    let bytes = fs::read(path).map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes.as_slice()))
        .map_err(|e| format!("{} is not a zip archive: {}", path.display(), e))?;

    if archive.index_for_name(ENTRY_POINT_FILE).is_none() {
        return Err(format!("package is missing {} at its root", ENTRY_POINT_FILE));
    }

    let env_member = archive.file_names().find(|name| name.ends_with(ENV_FILE)).map(str::to_string);
    let mut connection_string = None;
    if let Some(name) = env_member {
        let mut content = String::new();
        archive
            .by_name(&name)
            .map_err(|e| e.to_string())
            .and_then(|mut member| member.read_to_string(&mut content).map_err(|e| e.to_string()))
            .map_err(|e| format!("cannot read {}: {}", name, e))?;
        connection_string = connection_string_from_env(&content).map(str::to_string);
    }

    drop(archive);
    Ok(ArchiveFacts {
        connection_string: connection_string.unwrap_or_else(|| DEFAULT_CONNECTION_STRING.to_string()),
        bytes,
    })
}

impl ApplicationSpec {
    /// Python application serving the package's `wsgi:app`
    pub fn python_site(names: &ResourceNames, region: &str, connection_string: &str) -> Self {
        let settings = [
            (CONNECTION_STRING_KEY, connection_string),
            ("SCM_DO_BUILD_DURING_DEPLOYMENT", "true"),
            ("PYTHON_ENV", "production"),
            ("WEBSITE_HTTPLOGGING_RETENTION_DAYS", "7"),
        ];
        Self {
            resource_group: names.resource_group.clone(),
            name: names.app_name.clone(),
            plan_name: names.plan_name.clone(),
            region: region.to_string(),
            runtime: PYTHON_RUNTIME.to_string(),
            start_command: START_COMMAND.to_string(),
            app_settings: settings
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

struct StepFailure {
    kind: FailureKind,
    message: String,
}

impl StepFailure {
    fn remote(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Remote,
            message: message.into(),
        }
    }
}

async fn timed<T>(limit: Duration, call: impl Future<Output = anyhow::Result<T>>) -> Result<T, StepFailure> {
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(StepFailure::remote(format!("{:#}", e))),
        Err(_) => Err(StepFailure::remote(format!("timed out after {:?}", limit))),
    }
}

pub struct Orchestrator {
    client: Arc<dyn ProvisioningClient>,
    fallback: Arc<dyn FallbackDeployer>,
    config: DeployConfig,
}

impl Orchestrator {
    pub fn new(client: Arc<dyn ProvisioningClient>, fallback: Arc<dyn FallbackDeployer>, config: DeployConfig) -> Self {
        Self {
            client,
            fallback,
            config,
        }
    }

    pub fn config(&self) -> &DeployConfig {
        &self.config
    }

    pub fn capability(&self) -> Capability {
        self.client.capability()
    }

    /// Deploy `archive` under freshly generated resource names
    pub async fn deploy(&self, archive: &Path, display_name: &str) -> DeploymentJob {
        self.deploy_as(archive, display_name, ResourceNames::generate(display_name))
            .await
    }

    pub async fn deploy_as(&self, archive: &Path, display_name: &str, names: ResourceNames) -> DeploymentJob {
        let mut job = DeploymentJob::new(display_name, names, &self.config.region);
        info!(
            "Deployment {} started: app {} in {} ({})",
            job.job_id, job.app_name, job.resource_group, job.region
        );

        match self.run(&mut job, archive).await {
            Ok(()) => {
                info!("Deployment {} is live at {}", job.job_id, job.url.as_deref().unwrap_or(""));
            }
            Err(failure) => {
                job.mark_failed(failure.kind, failure.message);
                error!(
                    "Deployment {} failed at {}: {}",
                    job.job_id,
                    job.failed_step.unwrap_or(DeploymentStep::Preconditions),
                    job.error.as_deref().unwrap_or("")
                );
                if !job.created_resources.is_empty() {
                    let leftovers: Vec<String> = job
                        .created_resources
                        .iter()
                        .map(|r| format!("{} {}", r.kind, r.name))
                        .collect();
                    warn!(
                        "Deployment {} left resources behind, delete them manually: {}",
                        job.job_id,
                        leftovers.join(", ")
                    );
                }
            }
        }
        job
    }

    fn enter(&self, job: &mut DeploymentJob, step: DeploymentStep) {
        job.mark_step(step);
        info!("Deployment {}: {}", job.job_id, step);
    }

    async fn run(&self, job: &mut DeploymentJob, archive: &Path) -> Result<(), StepFailure> {
        let config = &self.config;
        let client = self.client.as_ref();

        self.enter(job, DeploymentStep::Preconditions);
        let facts = inspect_archive(archive).map_err(|message| StepFailure {
            kind: FailureKind::Precondition,
            message,
        })?;
        if let Capability::Unavailable(reason) = client.capability() {
            return Err(StepFailure {
                kind: FailureKind::CapabilityUnavailable,
                message: reason,
            });
        }

        self.enter(job, DeploymentStep::Authenticate);
        let token = timed(config.auth_timeout, client.authenticate()).await?;

        self.enter(job, DeploymentStep::ResolveSubscription);
        let subscription_id = match &config.subscription_override {
            Some(id) => {
                info!("Using subscription {} from configuration", id);
                id.clone()
            }
            None => {
                let subscriptions = timed(config.control_plane_timeout, client.list_subscriptions(&token)).await?;
                let first = subscriptions
                    .into_iter()
                    .next()
                    .ok_or_else(|| StepFailure::remote("no subscriptions available for this account"))?;
                info!("Using subscription {} ({})", first.id, first.display_name);
                first.id
            }
        };
        job.subscription_id = Some(subscription_id.clone());
        let ctx = ProvisioningContext {
            token,
            subscription_id,
        };

        let names = ResourceNames {
            app_name: job.app_name.clone(),
            resource_group: job.resource_group.clone(),
            plan_name: job.plan_name.clone(),
        };

        self.enter(job, DeploymentStep::CreateResourceGroup);
        timed(
            config.control_plane_timeout,
            client.create_resource_group(&ctx, &names.resource_group, &config.region),
        )
        .await?;
        job.record_resource("resource group", &names.resource_group);

        self.enter(job, DeploymentStep::CreateHostingPlan);
        let plan = HostingPlanSpec {
            resource_group: names.resource_group.clone(),
            name: names.plan_name.clone(),
            region: config.region.clone(),
        };
        timed(config.control_plane_timeout, client.create_hosting_plan(&ctx, &plan)).await?;
        job.record_resource("hosting plan", &names.plan_name);

        self.enter(job, DeploymentStep::CreateApplication);
        let spec = ApplicationSpec::python_site(&names, &config.region, &facts.connection_string);
        let handle = timed(config.control_plane_timeout, client.create_application(&ctx, &spec)).await?;
        job.record_resource("web app", &names.app_name);

        if let Err(failure) = timed(
            config.control_plane_timeout,
            client.configure_logging(&ctx, &names.resource_group, &names.app_name),
        )
        .await
        {
            warn!("Could not enable application logging for {}: {}", names.app_name, failure.message);
        }

        tokio::time::sleep(config.warm_up).await;

        self.enter(job, DeploymentStep::FetchCredentials);
        let credentials = timed(
            config.control_plane_timeout,
            client.fetch_publish_credentials(&ctx, &names.resource_group, &names.app_name),
        )
        .await?;
        let endpoint = handle.upload_endpoint();

        self.enter(job, DeploymentStep::UploadPackage);
        let mut last_error = String::new();
        let mut uploaded = false;
        for attempt in 1..=config.retry.max_attempts {
            info!(
                "Uploading package to {} (attempt {}/{})",
                endpoint, attempt, config.retry.max_attempts
            );
            match timed(
                config.upload_timeout,
                client.upload_package(&endpoint, &credentials, &facts.bytes),
            )
            .await
            {
                Ok(()) => {
                    job.record_attempt(attempt, None, None);
                    uploaded = true;
                    break;
                }
                Err(failure) => {
                    let backoff = config.retry.backoff_after(attempt);
                    warn!("Upload attempt {} failed: {}", attempt, failure.message);
                    job.record_attempt(attempt, Some(failure.message.clone()), backoff);
                    last_error = failure.message;
                    if let Some(delay) = backoff {
                        info!("Retrying upload in {:?}", delay);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        if !uploaded {
            let available = tokio::time::timeout(config.control_plane_timeout, self.fallback.is_available())
                .await
                .unwrap_or(false);
            if !available {
                return Err(StepFailure::remote(format!(
                    "all {} upload attempts failed and no fallback is available; last error: {}",
                    config.retry.max_attempts, last_error
                )));
            }

            self.enter(job, DeploymentStep::CliUpload);
            let target = FallbackTarget {
                subscription_id: &ctx.subscription_id,
                resource_group: &names.resource_group,
                app_name: &names.app_name,
                archive,
            };
            timed(config.fallback_timeout, self.fallback.deploy(target)).await?;
        }

        tokio::time::sleep(config.settle_delay).await;

        self.enter(job, DeploymentStep::Verify);
        let url = handle.public_url();
        let verified = match timed(config.probe_timeout, client.probe(&url)).await {
            Ok(status) if (200..300).contains(&status) => true,
            Ok(status) => {
                warn!("{} answered {}; it may still be starting", url, status);
                false
            }
            Err(failure) => {
                warn!("{} did not answer: {}; it may still be starting", url, failure.message);
                false
            }
        };

        job.mark_live(url, verified);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{AccessToken, ApplicationHandle, NoFallback, PublishCredentials, Subscription};
    use crate::models::{DeploymentOutcome, JobStatus};
    use async_trait::async_trait;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::{tempdir, TempDir};
    use tokio::time::Instant;

    #[derive(Default)]
    struct FakeClient {
        unavailable: bool,
        failing_uploads: u32,
        fail_at: Option<&'static str>,
        probe_status: u16,
        calls: Mutex<Vec<String>>,
        app_settings: Mutex<Vec<(String, String)>>,
    }

    impl FakeClient {
        fn call(&self, name: &str) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(name.to_string());
            if self.fail_at == Some(name) {
                anyhow::bail!("{} rejected", name);
            }
            Ok(())
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProvisioningClient for FakeClient {
        fn capability(&self) -> Capability {
            if self.unavailable {
                Capability::Unavailable("no credentials".to_string())
            } else {
                Capability::Available
            }
        }

        async fn authenticate(&self) -> anyhow::Result<AccessToken> {
            self.call("authenticate")?;
            Ok(AccessToken::new("token"))
        }

        async fn list_subscriptions(&self, _token: &AccessToken) -> anyhow::Result<Vec<Subscription>> {
            self.call("list_subscriptions")?;
            Ok(vec![Subscription {
                id: "sub-1".to_string(),
                display_name: "Pay-As-You-Go".to_string(),
            }])
        }

        async fn create_resource_group(&self, _: &ProvisioningContext, _: &str, _: &str) -> anyhow::Result<()> {
            self.call("create_resource_group")
        }

        async fn create_hosting_plan(&self, _: &ProvisioningContext, _: &HostingPlanSpec) -> anyhow::Result<()> {
            self.call("create_hosting_plan")
        }

        async fn create_application(
            &self,
            _: &ProvisioningContext,
            spec: &ApplicationSpec,
        ) -> anyhow::Result<ApplicationHandle> {
            self.call("create_application")?;
            *self.app_settings.lock().unwrap() = spec.app_settings.clone();
            Ok(ApplicationHandle {
                default_host_name: format!("{}.azurewebsites.net", spec.name),
            })
        }

        async fn configure_logging(&self, _: &ProvisioningContext, _: &str, _: &str) -> anyhow::Result<()> {
            self.call("configure_logging")
        }

        async fn fetch_publish_credentials(
            &self,
            _: &ProvisioningContext,
            _: &str,
            _: &str,
        ) -> anyhow::Result<PublishCredentials> {
            self.call("fetch_publish_credentials")?;
            Ok(PublishCredentials {
                username: "$acme".to_string(),
                password: "secret".to_string(),
            })
        }

        async fn upload_package(&self, endpoint: &str, _: &PublishCredentials, _: &[u8]) -> anyhow::Result<()> {
            self.call("upload_package")?;
            assert!(endpoint.ends_with(".scm.azurewebsites.net/api/zipdeploy"));
            let attempts = self.calls().iter().filter(|c| *c == "upload_package").count() as u32;
            if attempts <= self.failing_uploads {
                anyhow::bail!("upload returned 502 Bad Gateway");
            }
            Ok(())
        }

        async fn probe(&self, _url: &str) -> anyhow::Result<u16> {
            self.call("probe")?;
            Ok(self.probe_status)
        }
    }

    struct FakeFallback {
        available: bool,
        succeeds: bool,
        deployed: Mutex<Option<String>>,
    }

    #[async_trait]
    impl FallbackDeployer for FakeFallback {
        async fn is_available(&self) -> bool {
            self.available
        }

        async fn deploy(&self, target: FallbackTarget<'_>) -> anyhow::Result<()> {
            *self.deployed.lock().unwrap() = Some(target.app_name.to_string());
            if self.succeeds {
                Ok(())
            } else {
                anyhow::bail!("az exited with status 1")
            }
        }
    }

    fn archive(members: &[(&str, &str)]) -> (TempDir, std::path::PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("acme_url_shortener.zip");
        let mut zip = zip::ZipWriter::new(fs::File::create(&path).unwrap());
        for (name, content) in members {
            zip.start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
        (dir, path)
    }

    fn valid_archive() -> (TempDir, std::path::PathBuf) {
        archive(&[
            ("wsgi.py", "app = None"),
            (".env", "MONGODB_URI=mongodb://db.example:27017/links\n"),
        ])
    }

    fn names() -> ResourceNames {
        ResourceNames::with_suffix("Acme", "0badf00d")
    }

    fn orchestrator(client: Arc<FakeClient>, fallback: Arc<dyn FallbackDeployer>) -> Orchestrator {
        Orchestrator::new(client, fallback, DeployConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_with_exponential_backoff_then_succeeds() {
        let (_dir, path) = valid_archive();
        let client = Arc::new(FakeClient {
            failing_uploads: 2,
            probe_status: 200,
            ..FakeClient::default()
        });
        let started = Instant::now();

        let job = orchestrator(client.clone(), Arc::new(NoFallback))
            .deploy_as(&path, "Acme", names())
            .await;

        assert_eq!(
            job.outcome(),
            Some(DeploymentOutcome::Live {
                url: "https://acme0badf00d.azurewebsites.net".to_string(),
                verified: true,
            })
        );
        let backoffs: Vec<_> = job.upload_attempts.iter().map(|a| a.backoff_ms).collect();
        assert_eq!(backoffs, vec![Some(15_000), Some(22_500), None]);
        assert!(job.upload_attempts[2].succeeded);

        // warm-up + both backoffs + settle
        let expected = Duration::from_millis(10_000 + 15_000 + 22_500 + 45_000);
        let elapsed = started.elapsed();
        assert!(elapsed >= expected && elapsed < expected + Duration::from_secs(1));

        assert_eq!(
            client.calls(),
            vec![
                "authenticate",
                "list_subscriptions",
                "create_resource_group",
                "create_hosting_plan",
                "create_application",
                "configure_logging",
                "fetch_publish_credentials",
                "upload_package",
                "upload_package",
                "upload_package",
                "probe",
            ]
        );
        let settings = client.app_settings.lock().unwrap().clone();
        assert!(settings.contains(&(
            "MONGODB_URI".to_string(),
            "mongodb://db.example:27017/links".to_string()
        )));
        assert_eq!(job.subscription_id.as_deref(), Some("sub-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_uploads_use_fallback() {
        let (_dir, path) = valid_archive();
        let client = Arc::new(FakeClient {
            failing_uploads: 5,
            probe_status: 503,
            ..FakeClient::default()
        });
        let fallback = Arc::new(FakeFallback {
            available: true,
            succeeds: true,
            deployed: Mutex::new(None),
        });

        let job = orchestrator(client.clone(), fallback.clone())
            .deploy_as(&path, "Acme", names())
            .await;

        assert_eq!(job.upload_attempts.len(), 5);
        assert_eq!(job.upload_attempts[3].backoff_ms, Some(50_625));
        assert_eq!(job.upload_attempts[4].backoff_ms, None);
        assert_eq!(fallback.deployed.lock().unwrap().as_deref(), Some("acme0badf00d"));
        // Probe failure is a warning, not a failure
        assert_eq!(job.status, JobStatus::Live);
        assert!(!job.verified);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_uploads_without_fallback_fail() {
        let (_dir, path) = valid_archive();
        let client = Arc::new(FakeClient {
            failing_uploads: 5,
            ..FakeClient::default()
        });

        let job = orchestrator(client.clone(), Arc::new(NoFallback))
            .deploy_as(&path, "Acme", names())
            .await;

        match job.outcome() {
            Some(DeploymentOutcome::Failed { step, reason }) => {
                assert_eq!(step, DeploymentStep::UploadPackage);
                assert!(reason.contains("all 5 upload attempts failed"));
                assert!(reason.contains("502"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(!client.calls().contains(&"probe".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_fallback_is_terminal() {
        let (_dir, path) = valid_archive();
        let client = Arc::new(FakeClient {
            failing_uploads: 5,
            ..FakeClient::default()
        });
        let fallback = Arc::new(FakeFallback {
            available: true,
            succeeds: false,
            deployed: Mutex::new(None),
        });

        let job = orchestrator(client, fallback).deploy_as(&path, "Acme", names()).await;

        assert_eq!(job.failed_step, Some(DeploymentStep::CliUpload));
        assert!(job.error.as_deref().unwrap().contains("status 1"));
    }

    #[tokio::test]
    async fn test_missing_entry_point_fails_before_remote_calls() {
        let (_dir, path) = archive(&[("app.py", "app = None")]);
        let client = Arc::new(FakeClient::default());

        let job = orchestrator(client.clone(), Arc::new(NoFallback))
            .deploy_as(&path, "Acme", names())
            .await;

        assert_eq!(job.failed_step, Some(DeploymentStep::Preconditions));
        assert_eq!(job.failure, Some(FailureKind::Precondition));
        assert!(job.error.as_deref().unwrap().contains("wsgi.py"));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_capability_is_typed_failure() {
        let (_dir, path) = valid_archive();
        let client = Arc::new(FakeClient {
            unavailable: true,
            ..FakeClient::default()
        });

        let job = orchestrator(client.clone(), Arc::new(NoFallback))
            .deploy_as(&path, "Acme", names())
            .await;

        assert!(client.calls().is_empty());
        assert!(matches!(
            job.into_result(),
            Err(forge_common::Error::CapabilityUnavailable(reason)) if reason == "no credentials"
        ));
    }

    #[tokio::test]
    async fn test_failure_mid_sequence_records_created_resources() {
        let (_dir, path) = valid_archive();
        let client = Arc::new(FakeClient {
            fail_at: Some("create_application"),
            ..FakeClient::default()
        });

        let job = orchestrator(client.clone(), Arc::new(NoFallback))
            .deploy_as(&path, "Acme", names())
            .await;

        assert_eq!(job.failed_step, Some(DeploymentStep::CreateApplication));
        let created: Vec<_> = job.created_resources.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(created, vec!["acme0badf00d-rg", "acme0badf00d-plan"]);
        assert!(!client.calls().contains(&"upload_package".to_string()));
    }

    #[tokio::test]
    async fn test_subscription_override_skips_listing() {
        let (_dir, path) = valid_archive();
        let client = Arc::new(FakeClient {
            fail_at: Some("create_resource_group"),
            ..FakeClient::default()
        });
        let config = DeployConfig {
            subscription_override: Some("sub-override".to_string()),
            ..DeployConfig::default()
        };

        let job = Orchestrator::new(client.clone(), Arc::new(NoFallback), config)
            .deploy_as(&path, "Acme", names())
            .await;

        assert_eq!(job.subscription_id.as_deref(), Some("sub-override"));
        assert!(!client.calls().contains(&"list_subscriptions".to_string()));
        assert!(job.created_resources.is_empty());
    }

    #[test]
    fn test_inspect_archive_defaults_connection_string() {
        let (_dir, path) = archive(&[("wsgi.py", "")]);
        let facts = inspect_archive(&path).unwrap();
        assert_eq!(facts.connection_string, DEFAULT_CONNECTION_STRING);

        let (_dir, path) = archive(&[("wsgi.py", ""), ("site/.env", "OTHER=1\nMONGODB_URI= mongodb://x:1/y \n")]);
        assert_eq!(inspect_archive(&path).unwrap().connection_string, "mongodb://x:1/y");
    }

    #[test]
    fn test_inspect_archive_rejects_missing_file() {
        let dir = tempdir().unwrap();
        let err = inspect_archive(&dir.path().join("nope.zip")).unwrap_err();
        assert!(err.contains("does not exist"));
    }
}
