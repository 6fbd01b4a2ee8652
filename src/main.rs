use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::{Parser, ValueEnum};
use pagesmith::Config;
use tracing_subscriber::EnvFilter;

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Command {
    /// Compile, bundle and minify everything into dist.
    Build,
    /// Compile, then serve with file watching and live reload.
    Develop,
    /// Delete the temp and dist directories.
    Clean,
}

#[derive(Parser, Debug, Clone)]
#[clap(version, about)]
struct Args {
    #[clap(value_enum, index = 1, default_value = "build")]
    command: Command,

    /// Project root, defaults to the current directory.
    #[clap(long)]
    cwd: Option<Utf8PathBuf>,

    /// Configuration file, defaults to pages.config.toml in the root.
    #[clap(long)]
    config: Option<Utf8PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let root = match args.cwd {
        Some(cwd) => cwd,
        None => Utf8PathBuf::try_from(std::env::current_dir()?)?,
    };

    let config = match &args.config {
        Some(file) => Config::load_from(&root, file),
        None => Config::load(&root),
    };
    let config = Arc::new(config);

    match args.command {
        Command::Build => pagesmith::build(config)?,
        Command::Develop => pagesmith::develop(config)?,
        Command::Clean => pagesmith::clean(config)?,
    }

    Ok(())
}
