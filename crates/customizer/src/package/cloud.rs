//! Files the managed-cloud host needs next to the template
//!
//! Written into the site root before rewriting, so product-name
//! substitution reaches them like any other template file.

use super::entrypoint::EntryPoint;
use forge_common::Result;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Start command read by the hosting platform
pub const STARTUP_COMMAND: &str = "python -m gunicorn --bind=0.0.0.0 --timeout 600 wsgi:app";

/// Packages the host needs on top of the template's own requirements
pub const REQUIRED_PACKAGES: &[&str] = &["gunicorn==21.2.0", "python-dotenv==1.0.0"];

const RUN_SCRIPT: &str = r#"#!/bin/bash
echo "Starting URL Shortener setup on Azure Linux..."

echo "Installing dependencies..."
pip install --upgrade pip
pip install -r requirements.txt
pip install gunicorn python-dotenv

export PYTHONPATH=/home/site/wwwroot
export FLASK_APP=main.py

echo "Setup completed successfully!"
"#;

const HEALTH_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>URL Shortener Health Check</title>
    <style>
        body { font-family: Arial, sans-serif; padding: 20px; }
        .success { color: green; }
        .error { color: red; }
    </style>
</head>
<body>
    <h1>URL Shortener Health Check</h1>
    <p class="success">The application is running!</p>
    <p>If you're seeing this page directly, navigate to the <a href="/index">main application</a>.</p>
</body>
</html>
"#;

/// Prepare `site_root` for the managed-cloud layout
pub fn prepare(site_root: &Path, display_name: &str) -> Result<()> {
    let web_config = site_root.join("web.config");
    if web_config.exists() {
        fs::remove_file(&web_config)?;
        debug!("Removed {}", web_config.display());
    }

    fs::write(site_root.join("startup.txt"), STARTUP_COMMAND)?;

    let app_module = EntryPoint::app_module();
    let app_path = site_root.join(app_module.file_name);
    if !app_path.exists() {
        fs::write(&app_path, app_module.render(display_name))?;
        set_executable(&app_path)?;
        info!("Generated {}", app_path.display());
    }

    let run_script = site_root.join("run.sh");
    fs::write(&run_script, RUN_SCRIPT)?;
    set_executable(&run_script)?;

    fs::write(site_root.join("health.html"), HEALTH_PAGE)?;

    let requirements = site_root.join("requirements.txt");
    if requirements.exists() {
        let mut content = fs::read_to_string(&requirements)?;
        let before = content.len();
        for &package in REQUIRED_PACKAGES {
            let name = package.split("==").next().unwrap_or(package);
            if !content.contains(name) {
                content.push('\n');
                content.push_str(package);
            }
        }
        if content.len() != before {
            fs::write(&requirements, content)?;
            debug!("Added hosting packages to {}", requirements.display());
        }
    }

    let wsgi = EntryPoint::wsgi();
    fs::write(site_root.join(wsgi.file_name), wsgi.render(display_name))?;

    info!("Prepared {} for cloud hosting", site_root.display());
    Ok(())
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_prepare_writes_hosting_files() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("web.config"), "<configuration/>").unwrap();
        fs::write(root.join("requirements.txt"), "flask==3.0.0\ngunicorn\n").unwrap();

        prepare(root, "Acme").unwrap();

        assert!(!root.join("web.config").exists());
        assert_eq!(fs::read_to_string(root.join("startup.txt")).unwrap(), STARTUP_COMMAND);
        assert!(root.join("app.py").is_file());
        assert!(root.join("wsgi.py").is_file());
        assert!(root.join("health.html").is_file());

        let requirements = fs::read_to_string(root.join("requirements.txt")).unwrap();
        assert_eq!(requirements, "flask==3.0.0\ngunicorn\n\npython-dotenv==1.0.0");
    }

    #[test]
    fn test_prepare_keeps_existing_app_module() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("app.py"), "app = object()").unwrap();

        prepare(dir.path(), "Acme").unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("app.py")).unwrap(), "app = object()");
        assert!(!dir.path().join("requirements.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_run_script_is_executable() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        prepare(dir.path(), "Acme").unwrap();
        let mode = fs::metadata(dir.path().join("run.sh")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
