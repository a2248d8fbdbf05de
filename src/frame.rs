use crate::error::{Error, Result};

use std::fs;
use std::path::{Path, PathBuf};

/// A single still image of the sequence, named `frame_%04d.<ext>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub index: usize,
    pub path: PathBuf,
}

impl Frame {
    pub const EXTENSION: &'static str = "png";
    pub const PATTERN: &'static str = "frame_%04d.png";
    const IMAGE_EXTENSIONS: &'static [&'static str] = &["png", "jpg", "jpeg", "bmp", "webp"];

    pub fn file_name(index: usize) -> String {
        Self::file_name_with_extension(index, Self::EXTENSION)
    }

    pub fn file_name_with_extension(index: usize, extension: &str) -> String {
        format!("frame_{:04}.{}", index, extension)
    }

    pub fn new(dir: &Path, index: usize) -> Self {
        Self { index, path: dir.join(Self::file_name(index)) }
    }

    pub fn is_image(path: &Path) -> bool {
        path.is_file() && path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| Self::IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }

    /// Numeric index of a `frame_<digits>...` file. Trailing text after the
    /// digits is allowed, so `frame_0007_out.png` is frame 7.
    pub fn index_of(path: &Path) -> Option<usize> {
        let stem = path.file_stem()?.to_str()?;
        let rest = stem.strip_prefix("frame_")?;
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        rest[..digits].parse().ok()
    }

    /// Image files in `dir`, ordered by frame index. Indices can outgrow the
    /// padding, so name order is only the fallback for files without one.
    /// A missing directory lists as empty.
    pub fn list(dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut frames = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| Error::filesystem(dir, e))? {
            let path = entry.map_err(|e| Error::filesystem(dir, e))?.path();
            if Self::is_image(&path) {
                frames.push(path);
            }
        }
        frames.sort_by_cached_key(|path| {
            let index = Self::index_of(path);
            (index.is_none(), index, path.file_name().map(|name| name.to_os_string()))
        });
        Ok(frames)
    }

    /// Same as [`Frame::list`] but an empty result is an error.
    pub fn list_required(dir: &Path) -> Result<Vec<PathBuf>> {
        let frames = Self::list(dir)?;
        if frames.is_empty() {
            return Err(Error::no_frames(dir));
        }
        Ok(frames)
    }

    pub fn dimensions(path: &Path) -> Result<(u32, u32)> {
        image::image_dimensions(path)
            .map_err(|source| Error::Image { path: path.to_path_buf(), source })
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn names_are_zero_padded() {
        assert_eq!(Frame::file_name(0), "frame_0000.png");
        assert_eq!(Frame::file_name(42), "frame_0042.png");
        assert_eq!(Frame::file_name_with_extension(7, "jpg"), "frame_0007.jpg");
    }

    #[test]
    fn list_sorts_and_skips_non_images() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["frame_0010.png", "frame_0002.png", "frame_0001.jpg", "notes.txt"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("nested.png")).unwrap();

        assert_eq!(names(dir.path()), vec!["frame_0001.jpg", "frame_0002.png", "frame_0010.png"]);
    }

    #[test]
    fn missing_directory_is_empty_but_required_listing_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("frames");
        assert!(Frame::list(&missing).unwrap().is_empty());
        assert!(matches!(
            Frame::list_required(&missing),
            Err(Error::NoFramesFound { .. })
        ));
    }

    #[test]
    fn reads_dimensions_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(Frame::file_name(0));
        RgbImage::new(64, 48).save(&path).unwrap();
        assert_eq!(Frame::dimensions(&path).unwrap(), (64, 48));
    }

    fn names(dir: &Path) -> Vec<String> {
        Frame::list(dir)
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn parses_index_with_suffix() {
        assert_eq!(Frame::index_of(Path::new("/tmp/frame_0003.jpg")), Some(3));
        assert_eq!(Frame::index_of(Path::new("frame_12345_out.png")), Some(12345));
        assert_eq!(Frame::index_of(Path::new("frame_.png")), None);
        assert_eq!(Frame::index_of(Path::new("cover.png")), None);
    }

    #[test]
    fn list_orders_past_padding_width_numerically() {
        let dir = tempfile::tempdir().unwrap();
        for index in [10001, 999, 10000, 1001, 9999, 1000] {
            fs::write(dir.path().join(Frame::file_name(index)), b"x").unwrap();
        }
        fs::write(dir.path().join("cover.png"), b"x").unwrap();

        assert_eq!(
            names(dir.path()),
            vec![
                "frame_0999.png",
                "frame_1000.png",
                "frame_1001.png",
                "frame_9999.png",
                "frame_10000.png",
                "frame_10001.png",
                "cover.png",
            ]
        );
    }
}
