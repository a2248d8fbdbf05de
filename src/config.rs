//! Tool locations and per-run settings.
//!
//! `ToolPaths` is what a settings surface edits; it can be stored as TOML.
//! `PipelineConfig` is the full input for one run of the pipeline.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::workspace::Workspace;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolPaths {
    #[serde(default = "default_realesrgan_vulkan")]
    pub realesrgan_vulkan: PathBuf,
    #[serde(default = "default_scunet_script")]
    pub scunet_script: PathBuf,
    #[serde(default = "default_waifu2x")]
    pub waifu2x: PathBuf,
    #[serde(default = "default_swinir_script")]
    pub swinir_script: PathBuf,
    #[serde(default = "default_realesrgan_script")]
    pub realesrgan_script: PathBuf,
    /// Interpreter for the script backends.
    #[serde(default = "default_python")]
    pub python: PathBuf,
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: PathBuf,
    #[serde(default = "default_ffprobe")]
    pub ffprobe: PathBuf,
}

fn default_realesrgan_vulkan() -> PathBuf {
    PathBuf::from("./realesrgan-ncnn-vulkan")
}

fn default_scunet_script() -> PathBuf {
    PathBuf::from("SCUNet/main_test_scunet_real_application.py")
}

fn default_waifu2x() -> PathBuf {
    PathBuf::from("waifu2x-caffe/waifu2x-caffe-cui")
}

fn default_swinir_script() -> PathBuf {
    PathBuf::from("SwinIR/main_test_swinir.py")
}

fn default_realesrgan_script() -> PathBuf {
    PathBuf::from("inference_realesrgan.py")
}

fn default_python() -> PathBuf {
    PathBuf::from("python")
}

fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe() -> PathBuf {
    PathBuf::from("ffprobe")
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            realesrgan_vulkan: default_realesrgan_vulkan(),
            scunet_script: default_scunet_script(),
            waifu2x: default_waifu2x(),
            swinir_script: default_swinir_script(),
            realesrgan_script: default_realesrgan_script(),
            python: default_python(),
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
        }
    }
}

impl ToolPaths {
    pub const KEYS: [&'static str; 8] = [
        "realesrgan_vulkan",
        "scunet_script",
        "waifu2x",
        "swinir_script",
        "realesrgan_script",
        "python",
        "ffmpeg",
        "ffprobe",
    ];

    pub fn get(&self, key: &str) -> Option<&Path> {
        self.slot(key).map(|path| path.as_path())
    }

    pub fn set(&mut self, key: &str, path: impl Into<PathBuf>) -> Result<()> {
        let slot = self.slot_mut(key).ok_or_else(|| Error::Config(format!("unknown tool '{}'", key)))?;
        *slot = path.into();
        Ok(())
    }

    fn slot(&self, key: &str) -> Option<&PathBuf> {
        match key {
            "realesrgan_vulkan" => Some(&self.realesrgan_vulkan),
            "scunet_script" => Some(&self.scunet_script),
            "waifu2x" => Some(&self.waifu2x),
            "swinir_script" => Some(&self.swinir_script),
            "realesrgan_script" => Some(&self.realesrgan_script),
            "python" => Some(&self.python),
            "ffmpeg" => Some(&self.ffmpeg),
            "ffprobe" => Some(&self.ffprobe),
            _ => None,
        }
    }

    fn slot_mut(&mut self, key: &str) -> Option<&mut PathBuf> {
        match key {
            "realesrgan_vulkan" => Some(&mut self.realesrgan_vulkan),
            "scunet_script" => Some(&mut self.scunet_script),
            "waifu2x" => Some(&mut self.waifu2x),
            "swinir_script" => Some(&mut self.swinir_script),
            "realesrgan_script" => Some(&mut self.realesrgan_script),
            "python" => Some(&mut self.python),
            "ffmpeg" => Some(&mut self.ffmpeg),
            "ffprobe" => Some(&mut self.ffprobe),
            _ => None,
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::filesystem(parent, e))?;
        }
        fs::write(path, self.to_toml()?).map_err(|e| Error::filesystem(path, e))
    }
}

/// Everything one pipeline run needs.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub source: PathBuf,
    pub output_dir: PathBuf,
    pub output_filename: String,
    pub backend: Backend,
    pub brightness: bool,
    pub tools: ToolPaths,
}

impl PipelineConfig {
    pub const DEFAULT_OUTPUT_FILENAME: &'static str = "output.mp4";

    pub fn new(source: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            output_dir: output_dir.into(),
            output_filename: Self::DEFAULT_OUTPUT_FILENAME.to_string(),
            backend: Backend::default(),
            brightness: false,
            tools: ToolPaths::default(),
        }
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_brightness(mut self, brightness: bool) -> Self {
        self.brightness = brightness;
        self
    }

    pub fn with_tools(mut self, tools: ToolPaths) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_output_filename(mut self, name: impl Into<String>) -> Self {
        self.output_filename = name.into();
        self
    }

    pub fn workspace(&self) -> Workspace {
        Workspace::new(&self.output_dir)
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_filename)
    }
}
