//! Frame-based video enhancement pipeline.
//!
//! A source video is split into frames, run through an external
//! super-resolution tool, scaled back to its original size, optionally
//! brightened, and encoded again. External programs do all image work; this
//! crate sequences them and keeps the working directories consistent.

pub mod backend;
pub mod config;
pub mod error;
pub mod frame;
pub mod logging;
pub mod pipeline;
pub mod progress;
pub mod stages;
pub mod tool;
pub mod workspace;

#[cfg(test)]
mod testutil;

pub use backend::{resolve, Backend, InvocationRecipe, OutputPolicy};
pub use config::{PipelineConfig, ToolPaths};
pub use error::{Error, ExitInfo, Result};
pub use pipeline::Pipeline;
pub use progress::{ProgressBarSink, ProgressEvent, ProgressKind, ProgressSink, Reporter};
pub use workspace::{WorkingDirectory, Workspace};
