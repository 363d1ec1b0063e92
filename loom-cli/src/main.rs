//! loom - command-line front end for the `GltfLoom` importer

use clap::Parser;
use tracing_subscriber::filter::LevelFilter;

mod commands;
mod progress;

use commands::Commands;

#[derive(Parser)]
#[command(name = "loom")]
#[command(about = "Inspect, import and pack glTF 2.0 assets", long_about = None)]
#[command(version = gltfloom::VERSION)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    cli.command.execute()?;

    Ok(())
}
