use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use ctcrash::{build_pivot, config, data, density, render};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cross-tabulate the merged crash records
    Pivot {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Summarize crash locations for a density map
    Density {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Pivot { config } => {
            let app_config = config::AppConfig::load_from_file(config)?;
            let request = app_config
                .pivot
                .as_ref()
                .ok_or_else(|| anyhow!("No [pivot] section in {:?}", config))?;

            let accumulator = data::load_data(&app_config)?;
            let pivot = build_pivot(accumulator.dataset(), request)
                .context("Failed to build pivot table")?;
            print!("{}", pivot);

            if let Some(path) = &app_config.output.pivot_image {
                render::render_pivot_heatmap(&pivot, path, app_config.output.cell_size)
                    .with_context(|| format!("Failed to write pivot heatmap: {:?}", path))?;
                println!("Wrote {:?}", path);
            }
        }
        Commands::Density { config } => {
            let app_config = config::AppConfig::load_from_file(config)?;

            let accumulator = data::load_data(&app_config)?;
            let summary = density::summarize(accumulator.dataset())
                .context("Failed to summarize crash locations")?;
            println!(
                "{} crashes centred on ({:.6}, {:.6})",
                summary.points.len(),
                summary.centroid.y(),
                summary.centroid.x()
            );

            if let Some(path) = &app_config.output.density_image {
                let output = &app_config.output;
                render::render_density_map(&summary, path, output.map_zoom, output.map_size)
                    .with_context(|| format!("Failed to write density map: {:?}", path))?;
                println!("Wrote {:?}", path);
            }
        }
    }

    Ok(())
}
