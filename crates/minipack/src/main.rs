use std::{
    io::Write,
    path::PathBuf,
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};
use minipack::{Bundler, Config};

/// Bundle a CommonJS module graph into a single script
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Entry module, absolute or relative to the project root
    #[arg(short, long)]
    entry: Option<PathBuf>,

    /// Directory the bundle is written to
    #[arg(short, long)]
    output_path: Option<PathBuf>,

    /// Output file name template (`[name]`, `[hash]`, `[hash:N]`)
    #[arg(short, long)]
    filename: Option<String>,

    /// Configuration file to use instead of ./minipack.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Project root; module ids are relative to it
    #[arg(long)]
    context: Option<PathBuf>,

    /// Print the bundle to stdout instead of writing a file
    #[arg(long)]
    stdout: bool,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn apply_to(&self, config: &mut Config) {
        if let Some(context) = &self.context {
            config.context.clone_from(context);
        }
        if let Some(entry) = &self.entry {
            config.entry.clone_from(entry);
        }
        if let Some(output_path) = &self.output_path {
            config.output.path.clone_from(output_path);
        }
        if let Some(filename) = &self.filename {
            config.output.filename.clone_from(filename);
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.apply_to(&mut config);
    debug!("Effective configuration: {config:?}");

    let bundler = Bundler::from_config(&config)?;

    if cli.stdout {
        let (chunk, code) = bundler
            .bundle(&config.entry)
            .with_context(|| format!("Failed to bundle {}", config.entry.display()))?;
        info!(
            "Bundled {} modules from `{}`",
            chunk.graph.len(),
            chunk.entry
        );
        std::io::stdout()
            .lock()
            .write_all(code.as_bytes())
            .context("Failed to write bundle to stdout")?;
        return Ok(());
    }

    bundler
        .build(&config.entry, &config.output.path, &config.output.filename)
        .with_context(|| format!("Failed to bundle {}", config.entry.display()))?;
    Ok(())
}
