use crate::error::{Error, ExitInfo, Result};

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};

use tracing::debug;

const STDERR_TAIL_LINES: usize = 5;

pub fn describe(command: &Command) -> String {
    let mut line = command.get_program().to_string_lossy().into_owned();
    for arg in command.get_args() {
        line.push(' ');
        line.push_str(&arg.to_string_lossy());
    }
    line
}

pub(crate) fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|line| !line.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join(" | ")
}

fn spawn_error(tool: &str, command: &Command, error: std::io::Error) -> Error {
    if error.kind() == ErrorKind::NotFound {
        Error::tool_not_found(tool, PathBuf::from(command.get_program()))
    } else {
        Error::ToolExecutionFailed {
            tool: tool.to_string(),
            exit: ExitInfo { code: None, stderr: error.to_string() },
        }
    }
}

fn capture(tool: &str, command: &mut Command) -> Result<Output> {
    debug!(tool, command = %describe(command), "Running");
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| spawn_error(tool, command, e))
}

/// Runs `command` to completion. A non-zero exit is an error carrying the
/// last lines the tool wrote to stderr.
pub fn run(tool: &str, command: &mut Command) -> Result<()> {
    let output = capture(tool, command)?;
    if !output.status.success() {
        return Err(Error::ToolExecutionFailed {
            tool: tool.to_string(),
            exit: ExitInfo { code: output.status.code(), stderr: stderr_tail(&output.stderr) },
        });
    }
    Ok(())
}

/// The codec tool pair used for frame extraction, per-frame filters and muxing.
#[derive(Clone, Copy, Debug)]
pub struct Ffmpeg<'a> {
    ffmpeg: &'a Path,
    ffprobe: &'a Path,
}

impl<'a> Ffmpeg<'a> {
    pub const TOOL: &'static str = "ffmpeg";
    pub const PROBE_TOOL: &'static str = "ffprobe";

    pub const RESAMPLE_FILTER: &'static str = "lanczos";
    pub const BRIGHTNESS: f32 = 0.1;
    pub const FRAME_RATE: u32 = 10;
    pub const VIDEO_CODEC: &'static str = "libx264";
    pub const PRESET: &'static str = "slow";
    pub const CRF: u32 = 18;

    pub fn new(ffmpeg: &'a Path, ffprobe: &'a Path) -> Self {
        Self { ffmpeg, ffprobe }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(self.ffmpeg);
        command.args(["-hide_banner", "-v", "error"]);
        command
    }

    pub fn check_available(&self) -> Result<()> {
        let mut command = Command::new(self.ffmpeg);
        command.arg("-version");
        run(Self::TOOL, &mut command)
    }

    /// Best-effort frame count. `None` when the container does not say or
    /// the probe cannot run.
    pub fn probe_frame_count(&self, input: &Path) -> Option<usize> {
        let mut command = Command::new(self.ffprobe);
        command
            .args(["-hide_banner", "-v", "error", "-select_streams", "v:0", "-count_frames"])
            .args(["-show_entries", "stream=nb_read_frames", "-of", "default=noprint_wrappers=1"])
            .arg(input);
        let output = capture(Self::PROBE_TOOL, &mut command).ok()?;
        if !output.status.success() {
            return None;
        }
        Self::parse_frame_count(&String::from_utf8_lossy(&output.stdout))
    }

    fn parse_frame_count(data: &str) -> Option<usize> {
        data.lines()
            .filter_map(|line| line.split_once('='))
            .find(|(key, _)| key.trim() == "nb_read_frames")
            .and_then(|(_, value)| value.trim().parse().ok())
            .filter(|&count| count > 0)
    }

    /// Decodes `input` and streams every frame as PNG on stdout.
    pub fn spawn_frame_pipe(&self, input: &Path) -> Result<Child> {
        let mut command = self.command();
        command
            .arg("-i")
            .arg(input)
            .args(["-f", "image2pipe", "-vcodec", "png", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        debug!(command = %describe(&command), "Spawning frame pipe");
        command.spawn().map_err(|e| spawn_error(Self::TOOL, &command, e))
    }

    pub fn scale(&self, input: &Path, output: &Path, width: u32, height: u32) -> Result<()> {
        let filter = format!("scale={}:{}:flags={}", width, height, Self::RESAMPLE_FILTER);
        self.filter(input, output, &filter)
    }

    pub fn brighten(&self, input: &Path, output: &Path) -> Result<()> {
        let filter = format!("eq=brightness={}", Self::BRIGHTNESS);
        self.filter(input, output, &filter)
    }

    fn filter(&self, input: &Path, output: &Path, filter: &str) -> Result<()> {
        let mut command = self.command();
        command.arg("-i").arg(input).args(["-vf", filter, "-y"]).arg(output);
        run(Self::TOOL, &mut command)
    }

    /// Muxes `frames_dir/frame_%04d.png` into `output`, overwriting it.
    pub fn encode(&self, frames_dir: &Path, pattern: &str, output: &Path) -> Result<()> {
        let mut command = self.command();
        command
            .args(["-framerate", &Self::FRAME_RATE.to_string()])
            .arg("-i")
            .arg(frames_dir.join(pattern))
            .args(["-c:v", Self::VIDEO_CODEC, "-preset", Self::PRESET])
            .args(["-crf", &Self::CRF.to_string(), "-y"])
            .arg(output);
        run(Self::TOOL, &mut command)
    }
}
