//! Process-wide state
//!
//! The first request kicks off a one-time background initialization that
//! checks the template and font setup. It runs at most once per process
//! and holds nothing that needs tearing down.

use site_customizer::AssetSlots;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};
use tracing::{error, info, warn};

pub struct ProcessState {
    startup: Once,
    startup_complete: AtomicBool,
    template_dir: PathBuf,
    font_dirs: Vec<PathBuf>,
}

impl ProcessState {
    pub fn new(template_dir: PathBuf, font_dirs: Vec<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            startup: Once::new(),
            startup_complete: AtomicBool::new(false),
            template_dir,
            font_dirs,
        })
    }

    pub fn startup_complete(&self) -> bool {
        self.startup_complete.load(Ordering::Acquire)
    }

    /// Spawn the delayed initialization unless it already ran
    ///
    /// Must be called from within a Tokio runtime.
    pub fn begin_startup(self: &Arc<Self>) {
        self.startup.call_once(|| {
            let state = Arc::clone(self);
            tokio::spawn(async move {
                info!("Starting delayed initialization");
                let worker = Arc::clone(&state);
                match tokio::task::spawn_blocking(move || worker.inspect_environment()).await {
                    Ok(()) => info!("Delayed initialization complete"),
                    Err(e) => error!("Delayed initialization failed: {}", e),
                }
                state.startup_complete.store(true, Ordering::Release);
            });
        });
    }

    fn inspect_environment(&self) {
        if self.template_dir.is_dir() {
            info!("Template directory: {}", self.template_dir.display());
        } else {
            warn!(
                "Template directory {} is missing; generation requests will fail",
                self.template_dir.display()
            );
        }

        if AssetSlots::new(self.font_dirs.clone()).load_font().is_none() {
            warn!("No usable font found; placeholder logos will be blank");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_startup_runs_once_and_completes() {
        let state = ProcessState::new(PathBuf::from("/nonexistent/template"), vec![]);
        assert!(!state.startup_complete());

        state.begin_startup();
        state.begin_startup();

        for _ in 0..100 {
            if state.startup_complete() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(state.startup_complete());
        assert!(state.startup.is_completed());
    }
}
