//! # Circuit Guard Configuration Validator
//!
//! Command-line tool for validating circuit-guard configuration files across
//! environments before a service starts its breakers.

use std::path::PathBuf;
use std::process;

use circuit_guard::config::{BreakerSettings, ConfigManager};
use clap::{Parser, Subcommand};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate circuit-guard configuration files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Environment to validate (development, test, production)
    #[arg(short, long, default_value = "development")]
    environment: String,

    /// Configuration directory path (default: config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format (table, json)
    #[arg(long, default_value = "table")]
    format: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate the whole file (default)
    Validate,

    /// Show resolved breaker settings, for one component or all of them
    Show {
        /// Component name; omit to list the default and every component
        component: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    if let Err(e) = run(&cli) {
        error!("{e:#}");
        eprintln!("❌ {e:#}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let manager =
        ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), &cli.environment)?;
    info!(
        environment = %manager.environment(),
        directory = %manager.config_directory().display(),
        "Configuration valid"
    );

    match &cli.command {
        None | Some(Commands::Validate) => {
            println!(
                "✅ Configuration valid for environment '{}' ({} component overrides)",
                manager.environment(),
                manager.config().breakers.components.len()
            );
        }
        Some(Commands::Show { component }) => {
            let config = manager.config();
            let rows: Vec<(String, BreakerSettings)> = match component {
                Some(name) => vec![(name.clone(), config.settings_for(name))],
                None => {
                    let mut rows = vec![("default".to_string(), config.breakers.default.clone())];
                    let mut named: Vec<_> = config
                        .breakers
                        .components
                        .iter()
                        .map(|(name, settings)| (name.clone(), settings.clone()))
                        .collect();
                    named.sort_by(|a, b| a.0.cmp(&b.0));
                    rows.extend(named);
                    rows
                }
            };

            for (_, settings) in &rows {
                settings.to_breaker_config()?;
            }
            print_settings(&rows, &cli.format)?;
        }
    }

    Ok(())
}

fn print_settings(rows: &[(String, BreakerSettings)], format: &str) -> anyhow::Result<()> {
    match format {
        "json" => {
            let mut map = serde_json::Map::new();
            for (name, settings) in rows {
                map.insert(name.clone(), serde_json::to_value(settings)?);
            }
            println!("{}", serde_json::to_string_pretty(&map)?);
        }
        "table" => {
            println!(
                "{:<24} {:>14} {:>14} {:>14} {:>10}",
                "component", "max_fail_count", "run_timeout_ms", "reset_wait_ms", "buffer"
            );
            for (name, settings) in rows {
                println!(
                    "{:<24} {:>14} {:>14} {:>14} {:>10}",
                    name,
                    settings.max_fail_count,
                    settings.run_timeout_ms,
                    settings.reset_wait_ms,
                    settings.command_buffer_size
                );
            }
        }
        other => anyhow::bail!("unsupported output format '{other}' (expected table or json)"),
    }
    Ok(())
}
