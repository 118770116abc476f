//! Gridpace CLI - generate F1 race predictions

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use gridpace::config::RaceConfig;
use gridpace::reference::ReferenceData;
use gridpace::report::{save_report, validate_report};
use gridpace::weather::WeatherResolver;

const DEFAULT_RACES_DIR: &str = "races";
const DEFAULT_DATA_DIR: &str = "data/sessions";
const DEFAULT_OUTPUT_DIR: &str = "predictions";

#[derive(Parser)]
#[command(name = "gridpace")]
#[command(author, version, about = "F1 race time prediction CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate predictions for a race
    Predict {
        /// Race ID (e.g. "australia", "china", "japan")
        #[arg(short, long)]
        race: String,

        /// Directory of race configuration files
        #[arg(long, default_value = DEFAULT_RACES_DIR)]
        races_dir: PathBuf,

        /// Directory of historical session CSVs
        #[arg(long, default_value = DEFAULT_DATA_DIR)]
        data_dir: PathBuf,

        /// Output directory for prediction reports
        #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
        output_dir: PathBuf,

        /// Season reference tables (JSON); defaults to the built-in grid
        #[arg(long)]
        reference: Option<PathBuf>,
    },

    /// Validate an existing prediction report against the schema
    Validate {
        /// Path to a prediction report JSON file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set subscriber")?;

    let cli = Cli::parse();
    match cli.command {
        Commands::Predict {
            race,
            races_dir,
            data_dir,
            output_dir,
            reference,
        } => predict(&race, &races_dir, &data_dir, &output_dir, reference).await,
        Commands::Validate { file } => validate(&file),
    }
}

async fn predict(
    race: &str,
    races_dir: &PathBuf,
    data_dir: &PathBuf,
    output_dir: &PathBuf,
    reference_path: Option<PathBuf>,
) -> Result<()> {
    println!(
        "{}",
        format!("Generating predictions for {}", race.to_uppercase())
            .bold()
            .cyan()
    );

    let config = RaceConfig::load(races_dir, race)
        .with_context(|| format!("loading race config for '{}'", race))?;
    let reference = match reference_path {
        Some(path) => ReferenceData::load(&path)
            .with_context(|| format!("loading reference tables from {}", path.display()))?,
        None => ReferenceData::default(),
    };
    let resolver = WeatherResolver::from_env();

    let report = gridpace::pipeline::run(&config, &reference, &resolver, data_dir)
        .await
        .with_context(|| format!("prediction pipeline failed for '{}'", race))?;

    let output_path = output_dir.join(format!("{}.json", config.race_id));
    save_report(&report, &output_path)
        .with_context(|| format!("writing report to {}", output_path.display()))?;

    println!("\n{}", "Top 3 predictions:".bold());
    for (i, prediction) in report.predictions.iter().take(3).enumerate() {
        println!(
            "  {} {} - {:.3}s ({})",
            format!("P{}", i + 1).bold().yellow(),
            prediction.driver,
            prediction.predicted_time,
            prediction.team.dimmed()
        );
    }
    println!(
        "\n{} MAE {:.2}s, report saved to {}",
        "Done.".green().bold(),
        report.model_metadata.mae,
        output_path.display()
    );
    Ok(())
}

fn validate(file: &PathBuf) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {}", file.display()))?;
    validate_report(&value)?;
    println!("{} {} is a valid prediction report", "OK".green().bold(), file.display());
    Ok(())
}
