use crate::error::{Error, Result};

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Stage-owned subdirectories of the output directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorkingDirectory {
    Frames,
    ProcessedFrames,
    FinalFrames,
    BrightFrames,
    /// Where tools without an output flag drop their results.
    Results,
}

impl WorkingDirectory {
    pub const ALL: [WorkingDirectory; 5] = [
        WorkingDirectory::Frames,
        WorkingDirectory::ProcessedFrames,
        WorkingDirectory::FinalFrames,
        WorkingDirectory::BrightFrames,
        WorkingDirectory::Results,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            WorkingDirectory::Frames => "frames",
            WorkingDirectory::ProcessedFrames => "processed_frames",
            WorkingDirectory::FinalFrames => "final_frames",
            WorkingDirectory::BrightFrames => "bright_frames",
            WorkingDirectory::Results => "results",
        }
    }
}

impl fmt::Display for WorkingDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self, dir: WorkingDirectory) -> PathBuf {
        self.root.join(dir.name())
    }

    /// Path of `dir`, created if it does not exist yet.
    pub fn ensure(&self, dir: WorkingDirectory) -> Result<PathBuf> {
        let path = self.dir(dir);
        fs::create_dir_all(&path).map_err(|e| Error::filesystem(&path, e))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directories_live_under_root() {
        let workspace = Workspace::new("/videos/out");
        assert_eq!(
            workspace.dir(WorkingDirectory::ProcessedFrames),
            PathBuf::from("/videos/out/processed_frames")
        );
        assert_eq!(workspace.dir(WorkingDirectory::Results), PathBuf::from("/videos/out/results"));
    }

    #[test]
    fn ensure_creates_missing_directory() {
        let root = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(root.path().join("nested"));
        let frames = workspace.ensure(WorkingDirectory::Frames).unwrap();
        assert!(frames.is_dir());
        assert_eq!(workspace.ensure(WorkingDirectory::Frames).unwrap(), frames);
    }
}
