//! Data models for a deployment run

use crate::naming::ResourceNames;
use chrono::{DateTime, Utc};
use forge_common::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Orchestrator states, in the order they run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentStep {
    /// Local archive and capability checks, no remote side effects
    Preconditions,
    Authenticate,
    ResolveSubscription,
    CreateResourceGroup,
    CreateHostingPlan,
    CreateApplication,
    FetchCredentials,
    UploadPackage,
    CliUpload,
    Verify,
}

impl DeploymentStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStep::Preconditions => "PRECONDITIONS",
            DeploymentStep::Authenticate => "AUTHENTICATE",
            DeploymentStep::ResolveSubscription => "RESOLVE_SUBSCRIPTION",
            DeploymentStep::CreateResourceGroup => "CREATE_RESOURCE_GROUP",
            DeploymentStep::CreateHostingPlan => "CREATE_HOSTING_PLAN",
            DeploymentStep::CreateApplication => "CREATE_APPLICATION",
            DeploymentStep::FetchCredentials => "FETCH_CREDENTIALS",
            DeploymentStep::UploadPackage => "UPLOAD_PACKAGE",
            DeploymentStep::CliUpload => "CLI_UPLOAD",
            DeploymentStep::Verify => "VERIFY",
        }
    }
}

impl fmt::Display for DeploymentStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Live,
    Failed,
}

/// Why a job failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The archive does not satisfy the upload contract
    Precondition,
    /// No provisioning client usable in this environment
    CapabilityUnavailable,
    /// A remote call failed or timed out
    Remote,
}

/// A resource left behind in the cloud account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedResource {
    pub kind: String,
    pub name: String,
}

/// One primary upload attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadAttempt {
    /// 1-based
    pub attempt: u32,
    pub succeeded: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Wait before the next attempt, when there is one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff_ms: Option<u64>,
}

/// Terminal result of a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentOutcome {
    Live { url: String, verified: bool },
    Failed { step: DeploymentStep, reason: String },
}

/// A live application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveDeployment {
    pub url: String,
    /// Whether the post-deploy probe saw a 2xx
    pub verified: bool,
}

/// In-memory record of one orchestrator run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentJob {
    pub job_id: String,
    pub display_name: String,
    pub app_name: String,
    pub resource_group: String,
    pub plan_name: String,
    pub region: String,
    pub status: JobStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<DeploymentStep>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,

    pub created_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    pub verified: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<DeploymentStep>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub upload_attempts: Vec<UploadAttempt>,
    pub created_resources: Vec<CreatedResource>,
}

impl DeploymentJob {
    pub fn new(display_name: &str, names: ResourceNames, region: &str) -> Self {
        Self {
            job_id: Uuid::new_v4().to_string(),
            display_name: display_name.to_string(),
            app_name: names.app_name,
            resource_group: names.resource_group,
            plan_name: names.plan_name,
            region: region.to_string(),
            status: JobStatus::Pending,
            current_step: None,
            subscription_id: None,
            created_at: Utc::now(),
            completed_at: None,
            url: None,
            verified: false,
            failed_step: None,
            failure: None,
            error: None,
            upload_attempts: Vec::new(),
            created_resources: Vec::new(),
        }
    }

    /// Enter `step`
    pub fn mark_step(&mut self, step: DeploymentStep) {
        self.status = JobStatus::Running;
        self.current_step = Some(step);
    }

    pub fn record_resource(&mut self, kind: &str, name: &str) {
        self.created_resources.push(CreatedResource {
            kind: kind.to_string(),
            name: name.to_string(),
        });
    }

    pub fn record_attempt(&mut self, attempt: u32, error: Option<String>, backoff: Option<Duration>) {
        self.upload_attempts.push(UploadAttempt {
            attempt,
            succeeded: error.is_none(),
            error,
            backoff_ms: backoff.map(|d| d.as_millis() as u64),
        });
    }

    /// Mark job as live
    pub fn mark_live(&mut self, url: String, verified: bool) {
        self.status = JobStatus::Live;
        self.completed_at = Some(Utc::now());
        self.url = Some(url);
        self.verified = verified;
    }

    /// Mark job as failed at the current step
    pub fn mark_failed(&mut self, failure: FailureKind, error: String) {
        self.status = JobStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.failed_step = self.current_step;
        self.failure = Some(failure);
        self.error = Some(error);
    }

    /// `None` while the job has not reached a terminal state
    pub fn outcome(&self) -> Option<DeploymentOutcome> {
        match self.status {
            JobStatus::Live => Some(DeploymentOutcome::Live {
                url: self.url.clone().unwrap_or_default(),
                verified: self.verified,
            }),
            JobStatus::Failed => Some(DeploymentOutcome::Failed {
                step: self.failed_step.unwrap_or(DeploymentStep::Preconditions),
                reason: self.error.clone().unwrap_or_default(),
            }),
            JobStatus::Pending | JobStatus::Running => None,
        }
    }

    /// Collapse the job into the crate-wide error taxonomy
    pub fn into_result(self) -> Result<LiveDeployment, Error> {
        match self.status {
            JobStatus::Live => Ok(LiveDeployment {
                url: self.url.unwrap_or_default(),
                verified: self.verified,
            }),
            JobStatus::Failed if self.failure == Some(FailureKind::CapabilityUnavailable) => {
                Err(Error::CapabilityUnavailable(self.error.unwrap_or_default()))
            }
            JobStatus::Failed => Err(Error::Provisioning {
                step: self
                    .failed_step
                    .unwrap_or(DeploymentStep::Preconditions)
                    .to_string(),
                message: self.error.unwrap_or_default(),
            }),
            JobStatus::Pending | JobStatus::Running => Err(Error::Provisioning {
                step: self
                    .current_step
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "PENDING".to_string()),
                message: "deployment did not finish".to_string(),
            }),
        }
    }
}
