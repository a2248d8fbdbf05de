use frame_upscaler::{Backend, Error, PipelineConfig, ToolPaths};

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

/// Upscale a video frame by frame with an external super-resolution tool.
#[derive(Parser, Debug)]
#[command(name = "frame_upscaler", version)]
pub struct Args {
    /// TOML file with tool locations
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override one tool location, e.g. --tool waifu2x=/opt/waifu2x-caffe-cui
    #[arg(long = "tool", value_name = "KEY=PATH", value_parser = parse_tool, global = true)]
    pub tools: Vec<(String, PathBuf)>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Split the source video into frames/
    Extract(RunOptions),
    /// Upscale frames/, scale back down, optionally brighten
    Upscale(RunOptions),
    /// Encode the final frames into the output video
    Reassemble(RunOptions),
    /// Delete all working directories
    Cleanup(RunOptions),
    /// Extract, upscale and reassemble in one go
    Run(RunOptions),
    /// Inspect or create the tool configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write the default tool locations to a file
    Init {
        path: PathBuf,
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective tool locations
    Show,
}

#[derive(clap::Args, Debug, Clone)]
pub struct RunOptions {
    /// Source video
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Directory holding the working directories and the output video
    #[arg(short, long)]
    pub output_dir: PathBuf,

    /// File name of the output video
    #[arg(short = 'n', long, default_value = PipelineConfig::DEFAULT_OUTPUT_FILENAME)]
    pub output_name: String,

    /// vulkan-realesrgan, scunet, waifu2x, swinir, realesrgan-python or default
    #[arg(short, long, default_value_t = Backend::Default)]
    pub backend: Backend,

    /// Brighten frames after downscaling
    #[arg(long)]
    pub brightness: bool,
}

/// The pipeline subcommands, separated from `config`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Extract,
    Upscale,
    Reassemble,
    Cleanup,
    Run,
}

impl Stage {
    pub fn needs_input(self) -> bool {
        matches!(self, Stage::Extract | Stage::Run)
    }
}

pub enum Invocation<'a> {
    Config(&'a ConfigAction),
    Stage(Stage, &'a RunOptions),
}

impl Command {
    pub fn invocation(&self) -> Invocation<'_> {
        match self {
            Command::Config { action } => Invocation::Config(action),
            Command::Extract(options) => Invocation::Stage(Stage::Extract, options),
            Command::Upscale(options) => Invocation::Stage(Stage::Upscale, options),
            Command::Reassemble(options) => Invocation::Stage(Stage::Reassemble, options),
            Command::Cleanup(options) => Invocation::Stage(Stage::Cleanup, options),
            Command::Run(options) => Invocation::Stage(Stage::Run, options),
        }
    }
}

fn parse_tool(value: &str) -> Result<(String, PathBuf), String> {
    let (key, path) = value
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=PATH, got '{}'", value))?;
    if !ToolPaths::KEYS.contains(&key) {
        return Err(format!("unknown tool '{}', expected one of: {}", key, ToolPaths::KEYS.join(", ")));
    }
    Ok((key.to_string(), PathBuf::from(path)))
}

impl Args {
    pub fn tool_paths(&self) -> Result<ToolPaths, Error> {
        let mut tools = match &self.config {
            Some(path) => ToolPaths::load(path)?,
            None => ToolPaths::default(),
        };
        for (key, path) in &self.tools {
            tools.set(key, path)?;
        }
        Ok(tools)
    }
}

impl RunOptions {
    pub fn pipeline_config(&self, tools: ToolPaths, needs_input: bool) -> Result<PipelineConfig, Error> {
        let source = match (&self.input, needs_input) {
            (Some(input), _) => input.clone(),
            (None, false) => PathBuf::new(),
            (None, true) => return Err(Error::Config("--input is required for this command".to_string())),
        };
        Ok(PipelineConfig::new(source, &self.output_dir)
            .with_output_filename(&self.output_name)
            .with_backend(self.backend)
            .with_brightness(self.brightness)
            .with_tools(tools))
    }
}
