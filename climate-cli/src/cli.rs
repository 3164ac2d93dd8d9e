use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use climate_core::{Config, Enricher, FailurePolicy, resolve_month};
use tracing_subscriber::EnvFilter;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "climate",
    version,
    about = "Enrich map points with monthly climate averages"
)]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add avg_temp, avg_rain and avg_wind to every point in a JSON file.
    Enrich {
        /// Points file; defaults to `input_path` from the config.
        path: Option<PathBuf>,

        /// Write here instead of overwriting the input file.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Keep going when a point fails; it is written without averages.
        #[arg(long)]
        continue_on_error: bool,

        /// Always query the archive, bypassing the response cache.
        #[arg(long)]
        no_cache: bool,
    },

    /// Print the date range used for a month name.
    Range {
        /// English month name, any case.
        month: String,
    },

    /// Show the config file location and effective settings.
    Config {
        /// Write the effective settings to the config file.
        #[arg(long)]
        save: bool,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = match &self.config {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };
        init_tracing(&config.log_level);

        match self.command {
            Command::Enrich {
                path,
                output,
                continue_on_error,
                no_cache,
            } => {
                let input = path.unwrap_or_else(|| config.input_path.clone());
                let output = output.unwrap_or_else(|| input.clone());
                let policy = if continue_on_error {
                    FailurePolicy::Skip
                } else {
                    FailurePolicy::Abort
                };

                let archive = climate_core::provider_from_config(&config, !no_cache)
                    .context("Failed to set up the archive client")?;
                let report = Enricher::new(&archive)
                    .with_policy(policy)
                    .run(&input, &output)
                    .await
                    .with_context(|| format!("Failed to enrich {}", input.display()))?;

                println!(
                    "Enriched {} of {} points in {}",
                    report.enriched,
                    report.read,
                    output.display()
                );
                if !report.skipped.is_empty() {
                    println!("Skipped points: {:?}", report.skipped);
                }
            }
            Command::Range { month } => {
                println!("{}", range_line(&month));
            }
            Command::Config { save } => {
                let path = match (&self.config, save) {
                    (Some(path), true) => {
                        config.save_to(path)?;
                        path.clone()
                    }
                    (None, true) => config.save()?,
                    (Some(path), false) => path.clone(),
                    (None, false) => Config::config_file_path()?,
                };
                print!("{}", config_listing(&path, &config)?);
            }
        }

        Ok(())
    }
}

/// `start_date end_date` for a month name, as printed by `climate range`.
fn range_line(month: &str) -> String {
    resolve_month(month).to_string()
}

/// Config file path as a TOML comment, followed by the settings.
fn config_listing(path: &Path, config: &Config) -> anyhow::Result<String> {
    let body = toml::to_string_pretty(config).context("Failed to render configuration")?;
    Ok(format!("# {}\n{body}", path.display()))
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
