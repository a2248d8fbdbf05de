//! Super-resolution backends and how each one is invoked.

use crate::config::ToolPaths;
use crate::error::{Error, Result};
use crate::workspace::WorkingDirectory;

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Backend {
    VulkanRealEsrgan,
    Scunet,
    Waifu2x,
    SwinIr,
    RealEsrganPython,
    /// Used when nothing was picked: the Vulkan build with the general x4 model.
    #[default]
    Default,
}

impl Backend {
    pub const ALL: [Backend; 6] = [
        Backend::VulkanRealEsrgan,
        Backend::Scunet,
        Backend::Waifu2x,
        Backend::SwinIr,
        Backend::RealEsrganPython,
        Backend::Default,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Backend::VulkanRealEsrgan => "vulkan-realesrgan",
            Backend::Scunet => "scunet",
            Backend::Waifu2x => "waifu2x",
            Backend::SwinIr => "swinir",
            Backend::RealEsrganPython => "realesrgan-python",
            Backend::Default => "default",
        }
    }

    /// Human-readable name used in errors and logs.
    pub fn tool(&self) -> &'static str {
        match self {
            Backend::VulkanRealEsrgan | Backend::Default => "Real-ESRGAN Vulkan",
            Backend::Scunet => "SCUNet script",
            Backend::Waifu2x => "Waifu2x",
            Backend::SwinIr => "SwinIR script",
            Backend::RealEsrganPython => "Real-ESRGAN script",
        }
    }

    /// Key of the executable or script in [`ToolPaths`].
    pub fn tool_key(&self) -> &'static str {
        match self {
            Backend::VulkanRealEsrgan | Backend::Default => "realesrgan_vulkan",
            Backend::Scunet => "scunet_script",
            Backend::Waifu2x => "waifu2x",
            Backend::SwinIr => "swinir_script",
            Backend::RealEsrganPython => "realesrgan_script",
        }
    }

    pub fn is_script(&self) -> bool {
        matches!(self, Backend::Scunet | Backend::SwinIr | Backend::RealEsrganPython)
    }

    pub fn scale(&self) -> u32 {
        match self {
            Backend::VulkanRealEsrgan | Backend::Default | Backend::RealEsrganPython => 4,
            Backend::Waifu2x | Backend::SwinIr => 2,
            Backend::Scunet => 1,
        }
    }

    pub fn output_policy(&self) -> OutputPolicy {
        match self {
            Backend::Scunet => OutputPolicy::InputDirectory,
            Backend::SwinIr => OutputPolicy::ToolDefault(WorkingDirectory::Results),
            _ => OutputPolicy::Direct,
        }
    }

    fn arguments(&self) -> Vec<RecipeArg> {
        use RecipeArg::{Input, Literal, Output};
        match self {
            Backend::VulkanRealEsrgan => vec![
                Literal("-i"), Input,
                Literal("-o"), Output,
                Literal("-n"), Literal("realesr-animevideov3"),
                Literal("-s"), Literal("4"),
                Literal("-f"), Literal("png"),
            ],
            Backend::Default => vec![
                Literal("-i"), Input,
                Literal("-o"), Output,
                Literal("-n"), Literal("realesr-x4plus"),
                Literal("-s"), Literal("4"),
                Literal("-f"), Literal("png"),
            ],
            Backend::Waifu2x => vec![
                Literal("-i"), Input,
                Literal("-o"), Output,
                Literal("-m"), Literal("noise_scale"),
                Literal("--scale_ratio"), Literal("2.0"),
                Literal("--noise_level"), Literal("2"),
            ],
            Backend::Scunet => vec![
                Literal("--model_name"), Literal("scunet_color_real_psnr"),
                Literal("--testset_name"), Input,
            ],
            Backend::SwinIr => vec![
                Literal("--task"), Literal("classical_sr"),
                Literal("--scale"), Literal("2"),
                Literal("--folder_lq"), Input,
                Literal("--folder_gt"), Literal(""),
            ],
            Backend::RealEsrganPython => vec![
                Literal("--model"), Literal("RealESRGAN_x4plus"),
                Literal("--input"), Input,
                Literal("--output"), Output,
            ],
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        Backend::ALL
            .into_iter()
            .find(|backend| backend.name() == value)
            .ok_or_else(|| {
                let names: Vec<&str> = Backend::ALL.iter().map(|b| b.name()).collect();
                format!("unknown backend '{}', expected one of: {}", value, names.join(", "))
            })
    }
}

/// Where a backend leaves its upscaled frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputPolicy {
    /// Written straight into the requested output directory.
    Direct,
    /// Written next to the input frames; new files must be moved.
    InputDirectory,
    /// Written into a fixed directory relative to the tool's working
    /// directory; everything there must be moved.
    ToolDefault(WorkingDirectory),
}

impl OutputPolicy {
    pub fn needs_relocation(&self) -> bool {
        !matches!(self, OutputPolicy::Direct)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecipeArg {
    Literal(&'static str),
    Input,
    Output,
}

/// A resolved backend invocation. Paths have been checked to exist.
#[derive(Clone, Debug)]
pub struct InvocationRecipe {
    pub backend: Backend,
    pub program: PathBuf,
    pub script: Option<PathBuf>,
    pub args: Vec<RecipeArg>,
    pub scale: u32,
    pub output_policy: OutputPolicy,
}

impl InvocationRecipe {
    pub fn tool(&self) -> &'static str {
        self.backend.tool()
    }

    pub fn arguments(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let mut arguments = Vec::with_capacity(self.args.len() + 1);
        if let Some(script) = &self.script {
            arguments.push(script.clone().into_os_string());
        }
        for arg in &self.args {
            arguments.push(match arg {
                RecipeArg::Literal(value) => OsString::from(value),
                RecipeArg::Input => input.as_os_str().to_os_string(),
                RecipeArg::Output => output.as_os_str().to_os_string(),
            });
        }
        arguments
    }

    /// Command for one run, started from `working_dir`.
    pub fn command(&self, input: &Path, output: &Path, working_dir: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command.args(self.arguments(input, output)).current_dir(working_dir);
        command
    }
}

fn locate(backend: Backend, path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        return Err(Error::tool_not_found(backend.tool(), path));
    }
    fs::canonicalize(path).map_err(|_| Error::tool_not_found(backend.tool(), path))
}

/// Builds the invocation recipe for `backend`, failing without running
/// anything when its configured executable or script is missing.
pub fn resolve(backend: Backend, tools: &ToolPaths) -> Result<InvocationRecipe> {
    let configured = tools
        .get(backend.tool_key())
        .ok_or_else(|| Error::Config(format!("no path configured for {}", backend.tool())))?;
    let located = locate(backend, configured)?;

    let (program, script) = if backend.is_script() {
        (tools.python.clone(), Some(located))
    } else {
        (located, None)
    };

    Ok(InvocationRecipe {
        backend,
        program,
        script,
        args: backend.arguments(),
        scale: backend.scale(),
        output_policy: backend.output_policy(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tools_in(dir: &Path) -> ToolPaths {
        let mut tools = ToolPaths::default();
        for key in ["realesrgan_vulkan", "scunet_script", "waifu2x", "swinir_script", "realesrgan_script"] {
            let path = dir.join(key);
            fs::write(&path, b"").unwrap();
            tools.set(key, path).unwrap();
        }
        tools
    }

    #[test]
    fn names_round_trip_through_from_str() {
        for backend in Backend::ALL {
            assert_eq!(backend.name().parse::<Backend>().unwrap(), backend);
        }
        assert!("esrgan".parse::<Backend>().is_err());
        assert_eq!(Backend::default(), Backend::Default);
    }

    #[test]
    fn default_uses_vulkan_binary_with_general_model() {
        let dir = tempfile::tempdir().unwrap();
        let tools = tools_in(dir.path());
        let recipe = resolve(Backend::Default, &tools).unwrap();

        assert_eq!(recipe.program, fs::canonicalize(dir.path().join("realesrgan_vulkan")).unwrap());
        assert!(recipe.script.is_none());
        assert_eq!(recipe.scale, 4);
        let args = recipe.arguments(Path::new("/w/frames"), Path::new("/w/processed_frames"));
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            ["-i", "/w/frames", "-o", "/w/processed_frames", "-n", "realesr-x4plus", "-s", "4", "-f", "png"]
        );
    }

    #[test]
    fn script_backends_run_through_python() {
        let dir = tempfile::tempdir().unwrap();
        let tools = tools_in(dir.path());
        let recipe = resolve(Backend::SwinIr, &tools).unwrap();

        assert_eq!(recipe.program, PathBuf::from("python"));
        assert_eq!(recipe.output_policy, OutputPolicy::ToolDefault(WorkingDirectory::Results));
        let args = recipe.arguments(Path::new("/w/frames"), Path::new("/w/processed_frames"));
        assert_eq!(args[0], fs::canonicalize(dir.path().join("swinir_script")).unwrap().into_os_string());
        assert_eq!(args.last().unwrap(), &OsString::from(""));
        assert!(!args.contains(&OsString::from("/w/processed_frames")));
    }

    #[test]
    fn output_policies() {
        assert_eq!(Backend::Scunet.output_policy(), OutputPolicy::InputDirectory);
        assert!(Backend::Scunet.output_policy().needs_relocation());
        assert!(!Backend::Waifu2x.output_policy().needs_relocation());
        assert!(!Backend::RealEsrganPython.output_policy().needs_relocation());
    }

    #[test]
    fn missing_tool_is_rejected_by_name() {
        let mut tools = ToolPaths::default();
        tools.waifu2x = PathBuf::from("/nowhere/waifu2x-caffe-cui");
        match resolve(Backend::Waifu2x, &tools) {
            Err(Error::ToolNotFound { tool, path }) => {
                assert_eq!(tool, "Waifu2x");
                assert_eq!(path, PathBuf::from("/nowhere/waifu2x-caffe-cui"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
