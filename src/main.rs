mod args;

use args::{Args, ConfigAction, Invocation, Stage};
use frame_upscaler::logging::init_tracing;
use frame_upscaler::{Error, Pipeline, ProgressBarSink, Reporter, ToolPaths};

use std::process::ExitCode;

use clap::Parser;
use tracing::Level;

fn run_config(action: &ConfigAction, tools: &ToolPaths) -> Result<(), Error> {
    match action {
        ConfigAction::Init { path, force } => {
            if path.exists() && !force {
                return Err(Error::Config(format!("{} already exists, use --force to replace it", path.display())));
            }
            ToolPaths::default().save(path)?;
            println!("Wrote default tool locations to {}", path.display());
        }
        ConfigAction::Show => print!("{}", tools.to_toml()?),
    }
    Ok(())
}

fn run_pipeline(args: &Args) -> Result<(), Error> {
    let tools = args.tool_paths()?;
    let (stage, options) = match args.command.invocation() {
        Invocation::Config(action) => return run_config(action, &tools),
        Invocation::Stage(stage, options) => (stage, options),
    };

    let config = options.pipeline_config(tools, stage.needs_input())?;
    let progress = ProgressBarSink::new();
    let pipeline = Pipeline::new(config, Reporter::new(progress.clone()));

    if stage != Stage::Cleanup {
        pipeline.check_codec_tool()?;
    }

    let result = match stage {
        Stage::Extract => pipeline.extract().map(|count| format!("Extracted {} frames", count)),
        Stage::Upscale => pipeline.upscale().map(|_| "Frames upscaled".to_string()),
        Stage::Reassemble => pipeline
            .reassemble()
            .map(|output| format!("Video written to {}", output.display())),
        Stage::Cleanup => pipeline.cleanup().map(|_| "Working directories removed".to_string()),
        Stage::Run => pipeline
            .run_all()
            .map(|output| format!("Video written to {}", output.display())),
    };
    progress.finish();
    println!("{}", result?);
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    init_tracing(level);

    if let Err(error) = run_pipeline(&args) {
        eprintln!("Error: {}", error);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
