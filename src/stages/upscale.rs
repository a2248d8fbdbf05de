use crate::backend::{InvocationRecipe, OutputPolicy};
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::progress::{percent_of, Reporter};
use crate::tool::{self, Ffmpeg};
use crate::workspace::{WorkingDirectory, Workspace};

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

/// Runs a backend over `frames/`, then brings the results back to the
/// source resolution and optionally brightens them.
pub struct Upscale<'a> {
    workspace: Workspace,
    recipe: &'a InvocationRecipe,
    ffmpeg: Ffmpeg<'a>,
    brightness: bool,
    reporter: &'a Reporter,
}

impl<'a> Upscale<'a> {
    fn absolute(path: &Path) -> Result<PathBuf> {
        fs::canonicalize(path).map_err(|e| Error::filesystem(path, e))
    }

    fn file_names(dir: &Path) -> Result<HashSet<PathBuf>> {
        Ok(Frame::list(dir)?
            .into_iter()
            .filter_map(|path| path.file_name().map(PathBuf::from))
            .collect())
    }

    fn run_backend(&self, frames_dir: &Path, processed_dir: &Path) -> Result<()> {
        let input = Self::absolute(frames_dir)?;
        let output = Self::absolute(processed_dir)?;
        let working_dir = Self::absolute(self.workspace.root())?;

        let before = match self.recipe.output_policy {
            OutputPolicy::InputDirectory => Self::file_names(&input)?,
            _ => HashSet::new(),
        };

        self.reporter.report(format!("Upscaling with {}...", self.recipe.tool()), 0.0);
        let mut command = self.recipe.command(&input, &output, &working_dir);
        tool::run(self.recipe.tool(), &mut command)?;
        info!(backend = %self.recipe.backend, scale = self.recipe.scale, "Backend finished");

        let from = match self.recipe.output_policy {
            OutputPolicy::Direct => return Ok(()),
            OutputPolicy::InputDirectory => input,
            OutputPolicy::ToolDefault(dir) => self.workspace.dir(dir),
        };
        let produced: Vec<PathBuf> = Frame::list(&from)?
            .into_iter()
            .filter(|path| path.file_name().map(|name| !before.contains(Path::new(name))).unwrap_or(false))
            .collect();
        self.relocate(&from, &produced, &output)
    }

    /// Moves frames a backend left elsewhere into `processed_frames/`,
    /// renumbering them so the sequence pattern holds.
    fn relocate(&self, from: &Path, produced: &[PathBuf], processed_dir: &Path) -> Result<()> {
        if produced.is_empty() {
            return Err(Error::no_frames(from));
        }
        let total = produced.len();
        for (i, path) in produced.iter().enumerate() {
            let extension = path
                .extension()
                .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
                .unwrap_or_else(|| Frame::EXTENSION.to_string());
            let target = processed_dir.join(Frame::file_name_with_extension(i, &extension));
            fs::rename(path, &target).map_err(|e| Error::filesystem(path, e))?;

            let progress = percent_of(i + 1, total);
            self.reporter.report(
                format!("Upscaling with {}... {:.1}%", self.recipe.tool(), progress),
                progress,
            );
        }
        info!(frames = total, from = %from.display(), "Relocated backend output");
        Ok(())
    }

    /// Output is renumbered by position, whatever names the backend chose.
    fn downscale(&self, processed_dir: &Path, final_dir: &Path, width: u32, height: u32) -> Result<()> {
        let frames = Frame::list_required(processed_dir)?;
        let total = frames.len();
        for (i, frame) in frames.iter().enumerate() {
            self.ffmpeg.scale(frame, &final_dir.join(Frame::file_name(i)), width, height)?;
            let progress = percent_of(i + 1, total);
            self.reporter.report(format!("Downscaling frames... {:.1}%", progress), progress);
        }
        info!(frames = total, width, height, "Downscaled to source resolution");
        Ok(())
    }

    fn brighten(&self, final_dir: &Path, bright_dir: &Path) -> Result<()> {
        let frames = Frame::list_required(final_dir)?;
        let total = frames.len();
        for (i, frame) in frames.iter().enumerate() {
            self.ffmpeg.brighten(frame, &bright_dir.join(Frame::file_name(i)))?;
            let progress = percent_of(i + 1, total);
            self.reporter.report(format!("Applying brightness... {:.1}%", progress), progress);
        }
        info!(frames = total, "Brightness applied");
        Ok(())
    }

    fn start(&self) -> Result<()> {
        let frames_dir = self.workspace.dir(WorkingDirectory::Frames);
        let frames = Frame::list_required(&frames_dir)?;
        let (width, height) = Frame::dimensions(&frames[0])?;
        info!(frames = frames.len(), width, height, backend = %self.recipe.backend, "Upscaling");

        let processed_dir = self.workspace.ensure(WorkingDirectory::ProcessedFrames)?;
        self.run_backend(&frames_dir, &processed_dir)?;

        let processed = Frame::list(&processed_dir)?.len();
        if processed != frames.len() {
            warn!(expected = frames.len(), found = processed, "Backend produced a different number of frames");
        }

        let final_dir = self.workspace.ensure(WorkingDirectory::FinalFrames)?;
        self.downscale(&processed_dir, &final_dir, width, height)?;

        if self.brightness {
            let bright_dir = self.workspace.ensure(WorkingDirectory::BrightFrames)?;
            self.brighten(&final_dir, &bright_dir)?;
        }
        Ok(())
    }

    pub fn execute(config: &'a PipelineConfig, recipe: &'a InvocationRecipe, reporter: &'a Reporter) -> Result<()> {
        let this = Self {
            workspace: config.workspace(),
            recipe,
            ffmpeg: Ffmpeg::new(&config.tools.ffmpeg, &config.tools.ffprobe),
            brightness: config.brightness,
            reporter,
        };
        this.start()?;
        reporter.report("Frames upscaled and downscaled", 100.0);
        Ok(())
    }
}
