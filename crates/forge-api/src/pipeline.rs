//! One customization request, start to finish
//!
//! Workspace → environment file → cloud preparation (managed cloud only)
//! → asset slots → rewrite → feature toggles → documents → package, then
//! for the managed-cloud target a deployment attempt.

use cloud_deploy::Orchestrator;
use forge_common::{CustomizationRequest, DeploymentTarget, Error, Result, ThemePalette};
use site_customizer::package::{cloud, docs};
use site_customizer::{AssetSlots, FeatureToggle, Package, PackageAssembler, RewriteEngine, TemplateWorkspace};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// What the caller gets back
#[derive(Debug)]
pub enum PipelineOutcome {
    /// The package for download
    Archive { file_name: String, bytes: Vec<u8> },
    /// The managed-cloud application is live
    Deployed {
        display_name: String,
        url: String,
        verified: bool,
    },
    /// Deployment failed; the package is returned for manual deployment
    DeploymentFailed {
        file_name: String,
        bytes: Vec<u8>,
        message: String,
    },
}

pub struct Pipeline {
    template_dir: PathBuf,
    font_dirs: Vec<PathBuf>,
    orchestrator: Arc<Orchestrator>,
}

impl Pipeline {
    pub fn new(template_dir: PathBuf, font_dirs: Vec<PathBuf>, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            template_dir,
            font_dirs,
            orchestrator,
        }
    }

    pub fn template_dir(&self) -> &PathBuf {
        &self.template_dir
    }

    pub async fn run(&self, request: CustomizationRequest) -> Result<PipelineOutcome> {
        let template_dir = self.template_dir.clone();
        let font_dirs = self.font_dirs.clone();
        let build_request = request.clone();

        let (workspace, package) =
            tokio::task::spawn_blocking(move || build(&template_dir, font_dirs, &build_request))
                .await
                .map_err(|e| Error::Other(e.into()))??;

        let bytes = package.read()?;
        if request.target() != DeploymentTarget::ManagedCloud {
            return Ok(PipelineOutcome::Archive {
                file_name: package.file_name,
                bytes,
            });
        }

        let display_name = request.display_name().as_str();
        let job = self.orchestrator.deploy(&package.path, display_name).await;
        // The archive lives in the workspace; keep it until the upload is over
        drop(workspace);

        match job.into_result() {
            Ok(live) => Ok(PipelineOutcome::Deployed {
                display_name: display_name.to_string(),
                url: live.url,
                verified: live.verified,
            }),
            Err(e) => {
                warn!("Returning {} for manual deployment: {}", package.file_name, e);
                Ok(PipelineOutcome::DeploymentFailed {
                    file_name: package.file_name,
                    bytes,
                    message: e.to_string(),
                })
            }
        }
    }
}

/// Customize a fresh copy of the template and package it
fn build(
    template_dir: &std::path::Path,
    font_dirs: Vec<PathBuf>,
    request: &CustomizationRequest,
) -> Result<(TemplateWorkspace, Package)> {
    let name = request.display_name();
    let target = request.target();
    info!("Generating {} package for {}", target, name);

    let workspace = TemplateWorkspace::create(template_dir, name)?;
    workspace.write_env(request.connection_string())?;
    let site = workspace.site_root();

    if target == DeploymentTarget::ManagedCloud {
        cloud::prepare(site, name.as_str())?;
    }

    let slots = AssetSlots::new(font_dirs);
    if let Err(e) = slots.fill_logo(site, name.as_str(), request.logo()) {
        warn!("Logo slot left as is: {}", e);
    }
    if let Err(e) = slots.fill_favicon(site, request.theme_color(), request.favicon()) {
        warn!("Favicon slot left as is: {}", e);
    }

    let palette = request.theme_color().map(ThemePalette::new);
    let report = RewriteEngine::new(name.as_str(), palette).rewrite_tree(site);
    info!(
        "Rewrote {} of {} files ({} failures)",
        report.files_changed,
        report.files_scanned,
        report.failures.len()
    );

    let toggles = FeatureToggle::new(request.features()).apply(site);
    if !toggles.disabled.is_empty() {
        info!("Disabled features: {:?}", toggles.disabled);
    }

    docs::write(site, name, target)?;

    let package = PackageAssembler::new(&workspace, name).assemble(target)?;
    Ok((workspace, package))
}
