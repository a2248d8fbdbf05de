use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use image::RgbImage;

use crate::progress::{ProgressEvent, Reporter};

pub type Events = Arc<Mutex<Vec<ProgressEvent>>>;

pub fn recording_reporter() -> (Reporter, Events) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let captured = events.clone();
    let reporter = Reporter::new(move |event: &ProgressEvent| {
        captured.lock().unwrap().push(event.clone());
    });
    (reporter, events)
}

pub fn write_png(path: &Path, width: u32, height: u32) {
    RgbImage::from_pixel(width, height, image::Rgb([40, 90, 160]))
        .save(path)
        .unwrap();
}

/// Writes an executable `/bin/sh` script standing in for an external tool.
#[cfg(unix)]
pub fn fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

pub fn populate(dir: &Path, count: usize, width: u32, height: u32) {
    fs::create_dir_all(dir).unwrap();
    for i in 0..count {
        write_png(&dir.join(crate::frame::Frame::file_name(i)), width, height);
    }
}
