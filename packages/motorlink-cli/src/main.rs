//! Motorlink CLI - vehicle cloud access from the command line
//!
//! This binary authenticates against the vehicle manufacturer's cloud and
//! reads vehicle data:
//! - List the account's vehicles
//! - Fetch one vehicle's status document by VIN
//! - Show configuration paths and an example config
//!
//! Credentials come from flags or from `MOTORLINK_USERNAME` /
//! `MOTORLINK_PASSWORD`; nothing is persisted between runs.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use motorlink_core::{Authenticator, BrandProfile, Credentials, Session, VehicleClient, config};

#[derive(Parser)]
#[command(name = "motorlink")]
#[command(version)]
#[command(about = "Vehicle cloud access from the command line")]
#[command(long_about = "
Motorlink authenticates against a vehicle manufacturer's cloud telematics
API and reads vehicle data. Each invocation runs a fresh login; no tokens
or credentials are stored.

Quick start:
  export MOTORLINK_USERNAME=you@example.com
  export MOTORLINK_PASSWORD=...
  motorlink vehicles
  motorlink status VIN12345678901234

Endpoint and API-key overrides live in the config file; see: motorlink config
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Brand profile to use
    #[arg(short, long, global = true, default_value = "jeep-eu")]
    pub profile: String,

    /// Account email (falls back to MOTORLINK_USERNAME)
    #[arg(short, long, global = true)]
    pub username: Option<String>,

    /// Account password (falls back to MOTORLINK_PASSWORD)
    #[arg(long, global = true)]
    pub password: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the account's vehicles
    #[command(alias = "list")]
    Vehicles,

    /// Fetch one vehicle's status document
    Status {
        /// Vehicle identification number
        vin: String,
    },

    /// Show configuration paths and an example config
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("motorlink={log_level},motorlink_core={log_level}").into()
            }),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Vehicles => cmd_vehicles(&cli).await,
        Commands::Status { ref vin } => cmd_status(&cli, vin).await,
        Commands::Config => cmd_config(&cli),
    }
}

fn resolve_profile(cli: &Cli) -> Result<BrandProfile> {
    match config::load_profile(&cli.profile) {
        Some((profile, source)) => {
            tracing::debug!("Using profile '{}' ({})", cli.profile, source);
            Ok(profile)
        }
        None => bail!(
            "Unknown or incomplete profile '{}'. Define it in {} or pick a built-in one.",
            cli.profile,
            config::config_file_path_string()
        ),
    }
}

fn resolve_credentials(cli: &Cli) -> Result<Credentials> {
    let username = cli
        .username
        .clone()
        .or_else(|| std::env::var("MOTORLINK_USERNAME").ok())
        .context("No username: pass --username or set MOTORLINK_USERNAME")?;
    let password = cli
        .password
        .clone()
        .or_else(|| std::env::var("MOTORLINK_PASSWORD").ok())
        .context("No password: pass --password or set MOTORLINK_PASSWORD")?;
    Ok(Credentials { username, password })
}

async fn authenticate(cli: &Cli) -> Result<(BrandProfile, Session)> {
    let profile = resolve_profile(cli)?;
    let credentials = resolve_credentials(cli)?;

    let session = Authenticator::new(profile.clone(), credentials)?
        .authenticate()
        .await
        .context("Authentication failed")?;

    Ok((profile, session))
}

async fn cmd_vehicles(cli: &Cli) -> Result<()> {
    let (profile, session) = authenticate(cli).await?;
    let client = VehicleClient::new(profile, session)?;
    let list = client.list_vehicles().await?;

    match cli.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&list)?);
        }
        OutputFormat::Text => {
            if list.vehicles.is_empty() {
                println!("No vehicles on this account.");
                return Ok(());
            }
            println!("Vehicles ({}):", list.vehicles.len());
            for vehicle in &list.vehicles {
                let description = vehicle
                    .nickname
                    .as_deref()
                    .or(vehicle.model_description.as_deref())
                    .or(vehicle.make.as_deref())
                    .unwrap_or("-");
                println!("  {}  {}", vehicle.vin, description);
            }
        }
    }
    Ok(())
}

async fn cmd_status(cli: &Cli, vin: &str) -> Result<()> {
    let (profile, session) = authenticate(cli).await?;
    let client = VehicleClient::new(profile, session)?;
    let status = client.vehicle_status(vin).await?;

    match cli.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        OutputFormat::Text => {
            println!("Status for {vin}:");
            if status.vehicle_info.is_none() && status.ev_info.is_none() {
                println!("  (provider returned no vehicleInfo/evInfo sections)");
            }
            // The status document's exact shape varies per vehicle; print it
            // as formatted JSON rather than guessing at fields.
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }
    Ok(())
}

fn cmd_config(cli: &Cli) -> Result<()> {
    match cli.format {
        OutputFormat::Json => {
            let resolved = config::load_profile(&cli.profile).map(|(_, source)| source.to_string());
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "config_file": config::config_file_path_string(),
                    "profile": cli.profile,
                    "profile_source": resolved,
                }))?
            );
        }
        OutputFormat::Text => {
            println!("Config file: {}", config::config_file_path_string());
            match config::load_profile(&cli.profile) {
                Some((profile, source)) => {
                    println!("Profile '{}' ({source}):", cli.profile);
                    println!("  login_url:      {}", profile.login_url);
                    println!("  token_url:      {}", profile.token_url);
                    println!("  api_url:        {}", profile.api_url);
                    println!("  credential_url: {}", profile.credential_url);
                    println!("  region:         {}", profile.region);
                    println!("  locale:         {}", profile.locale);
                }
                None => println!("Profile '{}' is not defined.", cli.profile),
            }
            println!("\nExample config:\n{}", config::generate_example_config());
        }
    }
    Ok(())
}
