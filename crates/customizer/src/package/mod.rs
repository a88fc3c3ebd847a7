//! Package Assembler
//!
//! Produces exactly one zip archive per workspace. The member layout
//! depends on the deployment target:
//!
//! - standalone / containerized: the site tree with its slug folder,
//!   paths relative to the scratch directory;
//! - managed cloud: a generated `wsgi.py` plus the host's root files
//!   flattened at the archive root, then the rest of the site tree
//!   relative to the site root with hidden entries left out.

pub mod cloud;
pub mod docs;
pub mod entrypoint;

use crate::workspace::TemplateWorkspace;
use forge_common::layout::{ENTRY_POINT_FILE, ENV_FILE};
use entrypoint::EntryPoint;
use forge_common::{DeploymentTarget, DisplayName, Error, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

/// Members placed at the root of a managed-cloud archive, in order
pub const CLOUD_ROOT_FILES: [&str; 5] = [ENTRY_POINT_FILE, "app.py", "requirements.txt", ENV_FILE, "startup.txt"];

/// A finished archive inside the workspace scratch directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub path: PathBuf,
    pub target: DeploymentTarget,
    pub file_name: String,
}

impl Package {
    pub fn read(&self) -> Result<Vec<u8>> {
        Ok(fs::read(&self.path)?)
    }

    /// Member names in archive order
    pub fn members(&self) -> Result<Vec<String>> {
        list_members(&self.path)
    }
}

/// Member names of the zip archive at `path`, in archive order
pub fn list_members(path: &Path) -> Result<Vec<String>> {
    let mut archive = zip::ZipArchive::new(fs::File::open(path)?)?;
    let mut names = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        names.push(archive.by_index(i)?.name().to_string());
    }
    Ok(names)
}

enum MemberSource {
    File(PathBuf),
    Generated(Vec<u8>),
}

struct Member {
    name: String,
    source: MemberSource,
}

pub struct PackageAssembler<'a> {
    workspace: &'a TemplateWorkspace,
    name: &'a DisplayName,
}

impl<'a> PackageAssembler<'a> {
    pub fn new(workspace: &'a TemplateWorkspace, name: &'a DisplayName) -> Self {
        Self { workspace, name }
    }

    /// Build the archive for `target` next to the site root
    pub fn assemble(&self, target: DeploymentTarget) -> Result<Package> {
        let members = match target {
            DeploymentTarget::Standalone | DeploymentTarget::Containerized => self.tree_members()?,
            DeploymentTarget::ManagedCloud => self.cloud_members()?,
        };

        let file_name = self.name.archive_name();
        let path = self.workspace.root().join(&file_name);
        write_zip(&path, members)?;

        info!("Created {} package at {}", target, path.display());
        Ok(Package {
            path,
            target,
            file_name,
        })
    }

    fn tree_members(&self) -> Result<Vec<Member>> {
        let base = self.workspace.root();
        collect_files(self.workspace.site_root(), |_| true)?
            .into_iter()
            .map(|path| {
                Ok(Member {
                    name: archive_name(&path, base)?,
                    source: MemberSource::File(path),
                })
            })
            .collect()
    }

    fn cloud_members(&self) -> Result<Vec<Member>> {
        let site_root = self.workspace.site_root();

        let mut members = vec![Member {
            name: ENTRY_POINT_FILE.to_string(),
            source: MemberSource::Generated(EntryPoint::wsgi().render(self.name.as_str()).into_bytes()),
        }];

        for root_file in &CLOUD_ROOT_FILES[1..] {
            let path = site_root.join(root_file);
            if path.is_file() {
                members.push(Member {
                    name: root_file.to_string(),
                    source: MemberSource::File(path),
                });
            }
        }

        let rest = collect_files(site_root, |entry| {
            let file_name = entry.file_name().to_string_lossy();
            if entry.depth() == 0 {
                return true;
            }
            if entry.file_type().is_dir() {
                return !file_name.starts_with('.');
            }
            !CLOUD_ROOT_FILES.iter().any(|f| *f == file_name) && !file_name.starts_with('.')
        })?;

        for path in rest {
            members.push(Member {
                name: archive_name(&path, site_root)?,
                source: MemberSource::File(path),
            });
        }

        Ok(members)
    }
}

/// Sorted regular files under `root`; `keep` prunes directories and files
fn collect_files(root: &Path, keep: impl Fn(&DirEntry) -> bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| keep(entry));

    for entry in walker {
        let entry = entry.map_err(|e| Error::Other(e.into()))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn archive_name(path: &Path, base: &Path) -> Result<String> {
    let relative = path.strip_prefix(base).map_err(|_| {
        Error::Packaging(format!("{} is outside {}", path.display(), base.display()))
    })?;
    Ok(relative.to_string_lossy().replace('\\', "/"))
}

#[cfg(unix)]
fn file_mode(path: &Path) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o777)
        .unwrap_or(0o644)
}

#[cfg(not(unix))]
fn file_mode(_path: &Path) -> u32 {
    0o644
}

fn write_zip(out: &Path, members: Vec<Member>) -> Result<()> {
    let file = fs::File::create(out)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(0o644);

    for member in members {
        match member.source {
            MemberSource::File(path) => {
                let bytes = fs::read(&path)?;
                zip.start_file(member.name.as_str(), options.unix_permissions(file_mode(&path)))?;
                zip.write_all(&bytes)?;
            }
            MemberSource::Generated(bytes) => {
                zip.start_file(member.name.as_str(), options)?;
                zip.write_all(&bytes)?;
            }
        }
        debug!("Added {}", member.name);
    }

    zip.finish()?;
    Ok(())
}
