use std::fmt;
use std::io;
use std::path::PathBuf;

use image::error::ImageError;
use thiserror::Error;

/// How an external tool ended when it did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitInfo {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stderr: String,
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {}", code)?,
            None => write!(f, "terminated by signal")?,
        }
        if !self.stderr.is_empty() {
            write!(f, ": {}", self.stderr)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Cannot read source video {path} ({frames_written} frames written): {reason}")]
    SourceUnreadable {
        path: PathBuf,
        frames_written: usize,
        reason: String,
    },

    #[error("No frames found in {dir}")]
    NoFramesFound { dir: PathBuf },

    #[error("{tool} not found at '{path}'")]
    ToolNotFound { tool: String, path: PathBuf },

    #[error("{tool} failed with {exit}")]
    ToolExecutionFailed { tool: String, exit: ExitInfo },

    #[error("Filesystem operation failed on {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read frame {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: ImageError,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Stage '{running}' is still running")]
    Busy { running: &'static str },
}

impl Error {
    pub fn filesystem(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Filesystem { path: path.into(), source }
    }

    pub fn no_frames(dir: impl Into<PathBuf>) -> Self {
        Self::NoFramesFound { dir: dir.into() }
    }

    pub fn tool_not_found(tool: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::ToolNotFound { tool: tool.into(), path: path.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
