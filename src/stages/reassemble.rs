use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::progress::{percent_of, Reporter};
use crate::tool::Ffmpeg;
use crate::workspace::{WorkingDirectory, Workspace};

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

pub struct Reassemble;

impl Reassemble {
    /// Brightened frames when brightness was applied, otherwise the
    /// downscaled ones. There is no fallback between the two.
    pub fn source_dir(workspace: &Workspace, brightness: bool) -> PathBuf {
        if brightness {
            workspace.dir(WorkingDirectory::BrightFrames)
        } else {
            workspace.dir(WorkingDirectory::FinalFrames)
        }
    }

    /// The codec tool gives no progress signal, so completion is replayed
    /// as `frames + 1` estimated events once it has finished.
    fn report_estimated(reporter: &Reporter, frames: usize) {
        for i in 0..=frames {
            let progress = percent_of(i, frames.max(1));
            reporter.estimate(format!("Reassembling video... {:.1}%", progress), progress);
        }
    }

    fn ensure_parent(output: &Path) -> Result<()> {
        match output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            Some(parent) => fs::create_dir_all(parent).map_err(|e| Error::filesystem(parent, e)),
            None => Ok(()),
        }
    }

    pub fn execute(config: &PipelineConfig, reporter: &Reporter) -> Result<PathBuf> {
        let frames_dir = Self::source_dir(&config.workspace(), config.brightness);
        let frames = Frame::list_required(&frames_dir)?.len();
        let output = config.output_path();
        info!(frames, from = %frames_dir.display(), output = %output.display(), "Reassembling video");

        Self::ensure_parent(&output)?;
        reporter.report("Reassembling video... 0%", 0.0);
        Ffmpeg::new(&config.tools.ffmpeg, &config.tools.ffprobe).encode(&frames_dir, Frame::PATTERN, &output)?;

        Self::report_estimated(reporter, frames);
        reporter.report(format!("Video written to {}", output.display()), 100.0);
        info!(output = %output.display(), "Reassembly finished");
        Ok(output)
    }
}
