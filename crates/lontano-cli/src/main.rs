//! Lontano CLI - offline renderer for the distance spatializer.

mod commands;
mod scene;
mod wav;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "lontano")]
#[command(author, version, about = "Lontano spatializer CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Spatialize a WAV file
    Render(commands::render::RenderArgs),

    /// Generate test signals
    Generate(commands::generate::GenerateArgs),

    /// Show the acoustics derived from a room geometry
    Info(commands::info::InfoArgs),
}

fn main() -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render(args) => commands::render::run(args),
        Commands::Generate(args) => commands::generate::run(args),
        Commands::Info(args) => commands::info::run(args),
    }
}
