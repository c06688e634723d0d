use anyhow::Result;
use clap::{Parser, Subcommand};
use rollcall_core::{FaceCatalog, FaceEngine};
use rollcall_hw::Camera;
use tracing_subscriber::EnvFilter;

mod config;
mod controller;

#[derive(Parser)]
#[command(name = "rollcall", about = "Face-recognition attendance kiosk")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the attendance kiosk (default)
    Run,
    /// List available capture devices
    Devices,
    /// Load the enrollment dataset and report the catalog
    Catalog,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = config::Config::from_env();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => controller::run(&config),
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("no capture devices found");
            }
            for d in devices {
                println!("{}  {} ({})", d.path, d.name, d.driver);
            }
            Ok(())
        }
        Commands::Catalog => {
            let mut engine = FaceEngine::load(&config.model_dir)?;
            let catalog = FaceCatalog::load_from_dir(&config.dataset_dir, &mut engine)?;
            for (name, refs) in catalog.iter() {
                println!("{name}: {} reference image(s)", refs.len());
            }
            println!(
                "{} identities, {} references",
                catalog.identity_count(),
                catalog.reference_count()
            );
            Ok(())
        }
    }
}
