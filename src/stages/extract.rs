use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::progress::{percent_of, Reporter};
use crate::tool::{stderr_tail, Ffmpeg};
use crate::workspace::WorkingDirectory;

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout};
use std::thread;

use tracing::{info, warn};

/// Splits the codec tool's PNG stream into numbered frame files.
pub struct Extract<'a> {
    source: &'a Path,
    frames_dir: PathBuf,
    expected: Option<usize>,
    written: usize,
    reporter: &'a Reporter,
}

impl<'a> Extract<'a> {
    const PNG_FOOTER_SIGNATURE: &'static [u8] = &[0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82];
    const CHUNK_SIZE: usize = 1024 * 100; // 100KB
    const MAX_FRAME_BUFFER_SIZE: usize = 1024 * 1024 * 128; // 128MB

    fn find_png_footer(data: &[u8]) -> Option<usize> {
        data.windows(Self::PNG_FOOTER_SIGNATURE.len())
            .position(|window| window == Self::PNG_FOOTER_SIGNATURE)
            .map(|pos| pos + Self::PNG_FOOTER_SIGNATURE.len())
    }

    fn unreadable(&self, reason: impl Into<String>) -> Error {
        Error::SourceUnreadable {
            path: self.source.to_path_buf(),
            frames_written: self.written,
            reason: reason.into(),
        }
    }

    fn write_frame(&mut self, bytes: &[u8]) -> Result<()> {
        let frame = Frame::new(&self.frames_dir, self.written);
        fs::write(&frame.path, bytes).map_err(|e| Error::filesystem(&frame.path, e))?;
        self.written += 1;

        if let Some(total) = self.expected {
            let step = (total / 10).max(1);
            if self.written % step == 0 {
                let progress = percent_of(self.written, total);
                self.reporter.report(format!("Extracting frames... {:.1}%", progress), progress);
            }
        }
        Ok(())
    }

    fn process_stdout(&mut self, stdout: &mut ChildStdout) -> Result<()> {
        let mut frame_buffer = Vec::new();
        let mut read_chunk = vec![0u8; Self::CHUNK_SIZE];

        loop {
            let size = stdout
                .read(&mut read_chunk)
                .map_err(|e| self.unreadable(format!("failed to read frame stream: {}", e)))?;
            if size == 0 {
                break;
            }
            frame_buffer.extend_from_slice(&read_chunk[..size]);

            while let Some(index) = Self::find_png_footer(&frame_buffer) {
                let bytes: Vec<u8> = frame_buffer.drain(..index).collect();
                self.write_frame(&bytes)?;
            }
            if frame_buffer.len() > Self::MAX_FRAME_BUFFER_SIZE {
                return Err(self.unreadable(format!("frame buffer is too large: {}", frame_buffer.len())));
            }
        }

        if !frame_buffer.is_empty() {
            warn!(bytes = frame_buffer.len(), "Discarding incomplete trailing frame");
        }
        Ok(())
    }

    fn collect_stderr(child: &mut Child) -> thread::JoinHandle<Vec<u8>> {
        let stderr = child.stderr.take();
        thread::spawn(move || {
            let mut buffer = Vec::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_end(&mut buffer);
            }
            buffer
        })
    }

    /// Removes frames left over from a longer source extracted earlier.
    fn remove_stale(&self) -> Result<()> {
        let mut removed = 0;
        for path in Frame::list(&self.frames_dir)? {
            if Frame::index_of(&path).is_some_and(|index| index >= self.written) {
                fs::remove_file(&path).map_err(|e| Error::filesystem(&path, e))?;
                removed += 1;
            }
        }
        if removed > 0 {
            warn!(removed, "Removed stale frames from an earlier extraction");
        }
        Ok(())
    }

    fn start(&mut self, ffmpeg: Ffmpeg<'_>) -> Result<usize> {
        let mut child = ffmpeg.spawn_frame_pipe(self.source)?;
        let stderr = Self::collect_stderr(&mut child);

        let result = match child.stdout.take() {
            Some(mut stdout) => self.process_stdout(&mut stdout),
            None => Err(self.unreadable("frame stream unavailable")),
        };
        if result.is_err() {
            let _ = child.kill();
        }
        let status = child.wait().map_err(|e| self.unreadable(e.to_string()));
        let stderr = stderr.join().unwrap_or_default();
        result?;

        if !status?.success() {
            return Err(self.unreadable(stderr_tail(&stderr)));
        }
        if self.written == 0 {
            return Err(self.unreadable("no frames decoded"));
        }
        self.remove_stale()?;
        Ok(self.written)
    }

    /// Writes every frame of the source video to `frames/` and returns how
    /// many were written.
    pub fn execute(config: &'a PipelineConfig, reporter: &'a Reporter) -> Result<usize> {
        let source = config.source.as_path();
        if !source.is_file() {
            return Err(Error::SourceUnreadable {
                path: source.to_path_buf(),
                frames_written: 0,
                reason: "file does not exist".to_string(),
            });
        }

        let ffmpeg = Ffmpeg::new(&config.tools.ffmpeg, &config.tools.ffprobe);
        let frames_dir = config.workspace().ensure(WorkingDirectory::Frames)?;
        let expected = ffmpeg.probe_frame_count(source);
        info!(source = %source.display(), expected = ?expected, "Extracting frames");

        let mut this = Self { source, frames_dir, expected, written: 0, reporter };
        reporter.report("Extracting frames... 0%", 0.0);
        let count = this.start(ffmpeg)?;

        reporter.report(format!("Extracted {} frames", count), 100.0);
        info!(frames = count, "Extraction finished");
        Ok(count)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::testutil::{fake_tool, recording_reporter, write_png};

    /// A fake codec tool that "decodes" the source by concatenating PNGs.
    fn setup(frames: usize, probed: &str) -> (tempfile::TempDir, PipelineConfig) {
        let dir = tempfile::tempdir().unwrap();
        let stream = dir.path().join("stream");
        fs::create_dir(&stream).unwrap();
        for i in 0..frames {
            write_png(&stream.join(format!("{:03}.png", i)), 8 + i as u32, 6);
        }
        let source = dir.path().join("clip.mp4");
        fs::write(&source, b"not really a video").unwrap();

        let ffmpeg = fake_tool(
            dir.path(),
            "ffmpeg",
            &format!("[ -f \"$5\" ] || {{ echo \"$5: No such file\" >&2; exit 1; }}\ncat {}/*.png 2>/dev/null\nexit 0", stream.display()),
        );
        let ffprobe = fake_tool(dir.path(), "ffprobe", &format!("echo nb_read_frames={}", probed));

        let mut config = PipelineConfig::new(&source, dir.path().join("out"));
        config.tools.ffmpeg = ffmpeg;
        config.tools.ffprobe = ffprobe;
        (dir, config)
    }

    #[test]
    fn finds_footer_end() {
        let mut data = vec![1, 2, 3];
        data.extend_from_slice(Extract::PNG_FOOTER_SIGNATURE);
        data.extend_from_slice(&[9, 9]);
        assert_eq!(Extract::find_png_footer(&data), Some(3 + 12));
        assert_eq!(Extract::find_png_footer(&[1, 2, 3]), None);
    }

    #[test]
    fn writes_one_file_per_frame_in_order() {
        let (_dir, config) = setup(12, "12");
        let (reporter, events) = recording_reporter();

        let count = Extract::execute(&config, &reporter).unwrap();
        assert_eq!(count, 12);

        let frames = Frame::list(&config.workspace().dir(WorkingDirectory::Frames)).unwrap();
        assert_eq!(frames.len(), 12);
        for (i, path) in frames.iter().enumerate() {
            assert_eq!(path.file_name().unwrap().to_string_lossy(), Frame::file_name(i));
            assert_eq!(Frame::dimensions(path).unwrap(), (8 + i as u32, 6));
        }

        let events = events.lock().unwrap();
        assert!(events.last().unwrap().is_complete());
        // 0%, every frame (12 / 10 rounds the step to 1), then the final event.
        assert_eq!(events.len(), 14);
    }

    #[test]
    fn known_total_reports_every_tenth() {
        let (_dir, config) = setup(30, "30");
        let (reporter, events) = recording_reporter();

        assert_eq!(Extract::execute(&config, &reporter).unwrap(), 30);
        let percents: Vec<u32> = events.lock().unwrap().iter().map(|e| e.percent.round() as u32).collect();
        assert_eq!(percents, vec![0, 10, 20, 30, 40, 50, 60, 70, 80, 90, 100, 100]);
    }

    #[test]
    fn shorter_source_replaces_earlier_frames() {
        let (_dir, config) = setup(3, "3");
        let frames_dir = config.workspace().dir(WorkingDirectory::Frames);
        crate::testutil::populate(&frames_dir, 5, 4, 4);
        fs::write(frames_dir.join("notes.png.txt"), b"keep").unwrap();

        assert_eq!(Extract::execute(&config, &Reporter::silent()).unwrap(), 3);
        let frames = Frame::list(&frames_dir).unwrap();
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|path| Frame::dimensions(path).unwrap().1 == 6));
        assert!(frames_dir.join("notes.png.txt").exists());
    }

    #[test]
    fn unknown_total_only_reports_start_and_finish() {
        let (_dir, config) = setup(3, "N/A");
        let (reporter, events) = recording_reporter();

        assert_eq!(Extract::execute(&config, &reporter).unwrap(), 3);
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].percent, 100.0);
    }

    #[test]
    fn missing_source_is_unreadable() {
        let (_dir, mut config) = setup(1, "1");
        config.source = config.source.with_file_name("gone.mp4");
        let err = Extract::execute(&config, &Reporter::silent()).unwrap_err();
        assert!(matches!(err, Error::SourceUnreadable { frames_written: 0, .. }));
    }

    #[test]
    fn codec_failure_is_unreadable_with_reason() {
        let (dir, mut config) = setup(0, "0");
        config.tools.ffmpeg = fake_tool(dir.path(), "ffmpeg-broken", "echo 'Invalid data found' >&2\nexit 1");
        match Extract::execute(&config, &Reporter::silent()) {
            Err(Error::SourceUnreadable { frames_written, reason, .. }) => {
                assert_eq!(frames_written, 0);
                assert!(reason.contains("Invalid data found"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn empty_stream_is_unreadable() {
        let (_dir, config) = setup(0, "0");
        let err = Extract::execute(&config, &Reporter::silent()).unwrap_err();
        assert!(matches!(err, Error::SourceUnreadable { .. }));
    }
}
