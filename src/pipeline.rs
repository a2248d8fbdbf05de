//! The coordinator: one synchronous call per stage.
//!
//! Stages communicate only through the working directories, so each one can
//! be re-run on its own after fixing whatever made it fail. Only one stage
//! may run at a time on a given [`Pipeline`].

use crate::backend;
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::progress::Reporter;
use crate::stages::{Cleanup, Extract, Reassemble, Upscale};
use crate::tool::Ffmpeg;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use tracing::{error, info};

pub struct Pipeline {
    config: PipelineConfig,
    reporter: Reporter,
    busy: AtomicBool,
    running: Mutex<&'static str>,
}

struct BusyGuard<'a> {
    busy: &'a AtomicBool,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

impl Pipeline {
    pub fn new(config: PipelineConfig, reporter: Reporter) -> Self {
        Self {
            config,
            reporter,
            busy: AtomicBool::new(false),
            running: Mutex::new(""),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Edit settings between stages. Needs exclusive access, so it cannot
    /// overlap a running stage.
    pub fn config_mut(&mut self) -> &mut PipelineConfig {
        &mut self.config
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// The flag and the stage name change together under the name lock.
    fn acquire(&self, stage: &'static str) -> Result<BusyGuard<'_>> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if self.busy.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            return Err(Error::Busy { running: *running });
        }
        *running = stage;
        Ok(BusyGuard { busy: &self.busy })
    }

    fn stage<T>(&self, name: &'static str, run: impl FnOnce() -> Result<T>) -> Result<T> {
        let _guard = self.acquire(name)?;
        info!(stage = name, "Stage started");
        let result = run();
        match &result {
            Ok(_) => info!(stage = name, "Stage finished"),
            Err(e) => {
                error!(stage = name, error = %e, "Stage failed");
                self.reporter.report(format!("Error during {}: {}", name, e), 0.0);
            }
        }
        result
    }

    /// Fails with `ToolNotFound` when the codec tool cannot be started.
    pub fn check_codec_tool(&self) -> Result<()> {
        Ffmpeg::new(&self.config.tools.ffmpeg, &self.config.tools.ffprobe).check_available()
    }

    pub fn extract(&self) -> Result<usize> {
        self.stage("extract", || Extract::execute(&self.config, &self.reporter))
    }

    pub fn upscale(&self) -> Result<()> {
        self.stage("upscale", || {
            let recipe = backend::resolve(self.config.backend, &self.config.tools)?;
            Upscale::execute(&self.config, &recipe, &self.reporter)
        })
    }

    pub fn reassemble(&self) -> Result<PathBuf> {
        self.stage("reassemble", || Reassemble::execute(&self.config, &self.reporter))
    }

    pub fn cleanup(&self) -> Result<()> {
        self.stage("cleanup", || Cleanup::execute(&self.config.workspace(), &self.reporter))
    }

    /// Extract, upscale and reassemble, stopping at the first failure.
    pub fn run_all(&self) -> Result<PathBuf> {
        self.extract()?;
        self.upscale()?;
        self.reassemble()
    }
}
