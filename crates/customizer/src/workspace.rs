//! Template Workspace
//!
//! A private copy of the template tree inside a fresh scratch directory:
//!
//! ```text
//! <scratch>/
//!   <slug>/        site root, the copied template
//!   <slug>_url_shortener.zip
//! ```
//!
//! The scratch directory is removed when the workspace is dropped.

use forge_common::layout::{env_file_content, ENV_FILE};
use forge_common::{DisplayName, Error, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};
use walkdir::WalkDir;

pub struct TemplateWorkspace {
    scratch: TempDir,
    site_root: PathBuf,
    slug: String,
}

impl TemplateWorkspace {
    /// Copy `template` into a new scratch directory under the name's slug
    pub fn create(template: &Path, name: &DisplayName) -> Result<Self> {
        if !template.is_dir() {
            return Err(Error::Packaging(format!(
                "template directory {} not found",
                template.display()
            )));
        }

        let scratch = tempfile::Builder::new().prefix("forge-").tempdir()?;
        let slug = name.slug();
        let mut components = Path::new(&slug).components();
        if !matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) {
            return Err(Error::Validation(format!("unusable site folder name {:?}", slug)));
        }
        let site_root = scratch.path().join(&slug);

        let copied = copy_tree(template, &site_root)?;
        info!(
            "Copied {} template files into workspace {}",
            copied,
            site_root.display()
        );

        Ok(Self {
            scratch,
            site_root,
            slug,
        })
    }

    /// Scratch directory holding the site root and the archive
    pub fn root(&self) -> &Path {
        self.scratch.path()
    }

    /// Copied template tree
    pub fn site_root(&self) -> &Path {
        &self.site_root
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// Write the `.env` file with the connection string
    pub fn write_env(&self, connection_string: &str) -> Result<PathBuf> {
        let path = self.site_root.join(ENV_FILE);
        fs::write(&path, env_file_content(connection_string))?;
        debug!("Wrote {}", path.display());
        Ok(path)
    }
}

/// Recursively copy files and directories; symlinks are not followed.
/// Returns the number of files copied.
fn copy_tree(from: &Path, to: &Path) -> Result<usize> {
    let mut copied = 0;

    for entry in WalkDir::new(from).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Other(e.into()))?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| Error::Other(e.into()))?;
        let target = to.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target)?;
            copied += 1;
        } else {
            debug!("Skipping non-regular file {}", entry.path().display());
        }
    }

    Ok(copied)
}
