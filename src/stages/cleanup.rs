use crate::error::{Error, Result};
use crate::progress::{percent_of, Reporter};
use crate::workspace::{WorkingDirectory, Workspace};

use std::fs;
use std::io::ErrorKind;

use tracing::{debug, info};

pub struct Cleanup;

impl Cleanup {
    /// Removes every working directory under the workspace. Directories that
    /// are already gone are skipped; each of the five counts toward progress.
    pub fn execute(workspace: &Workspace, reporter: &Reporter) -> Result<()> {
        let total = WorkingDirectory::ALL.len();
        reporter.report("Cleaning up... 0%", 0.0);

        for (i, dir) in WorkingDirectory::ALL.iter().enumerate() {
            let path = workspace.dir(*dir);
            match fs::remove_dir_all(&path) {
                Ok(()) => debug!(dir = %path.display(), "Removed"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(Error::filesystem(&path, e)),
            }
            let progress = percent_of(i + 1, total);
            reporter.report(format!("Cleaning up {}... {:.1}%", dir, progress), progress);
        }

        info!(root = %workspace.root().display(), "Working directories removed");
        reporter.report("Temporary files removed", 100.0);
        Ok(())
    }
}
