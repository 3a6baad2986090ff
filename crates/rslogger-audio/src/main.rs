//! rslogger-audio: remote-controlled audio recording fleet.
//!
//! Subcommands:
//! - `rslogger-audio fleet --module <id>...` - run modules and a controller console
//! - `rslogger-audio module --id <id> [--broker host] [--port n]` - one module on MQTT
//! - `rslogger-audio controller [--broker host] [--port n]` - controller console on MQTT
//! - `rslogger-audio devices` - list audio input devices
//! - `rslogger-audio config show|reset` - inspect or reset the configuration file

mod app;
mod cli;
mod config;
mod console_command;
mod error;
mod logging;
mod settings_store;

pub(crate) use {
    app::App,
    error::{AppError, Result as AppResult},
    settings_store::FileSettingsStore,
};

use crate::{
    cli::{Cli, Commands, ConfigAction},
    config::Config,
};

use clap::Parser;
use rslogger_audio_core::list_input_devices;
use tracing::error;

/// Application entry point.
#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!(error = ?e, "rslogger-audio failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> AppResult<()> {
    let config_path = match &cli.config_file {
        Some(path) => path.clone(),
        None => Config::default_path()?,
    };

    // Reset must work even when the existing file no longer parses.
    if let Commands::Config {
        action: ConfigAction::Reset,
    } = cli.command
    {
        Config::default().save_to(&config_path)?;
        println!("Configuration reset: {}", config_path.display());
        return Ok(());
    }

    let mut config = Config::load_from(&config_path)?;
    cli.overrides.apply_to(&mut config);
    config.validate()?;

    let _log_guard = logging::init(&config.logging);

    match cli.command {
        Commands::Fleet { modules, synthetic } => {
            let app = App {
                module_ids: App::parse_module_ids(&modules)?,
                config,
                config_path,
                synthetic,
            };
            app.run_fleet().await
        }
        Commands::Module { id, synthetic } => {
            let app = App {
                module_ids: App::parse_module_ids(&[id])?,
                config,
                config_path,
                synthetic,
            };
            app.run_module().await
        }
        Commands::Controller => {
            let app = App {
                module_ids: Vec::new(),
                config,
                config_path,
                synthetic: false,
            };
            app.run_controller().await
        }
        Commands::Devices => {
            let devices = list_input_devices()?;
            if devices.is_empty() {
                println!("No input devices found");
            }
            for device in devices {
                println!(
                    "{}{} ({} ch, {} Hz)",
                    if device.is_default { "* " } else { "  " },
                    device.name,
                    device.channels,
                    device.samplerate
                );
            }
            Ok(())
        }
        Commands::Config {
            action: ConfigAction::Show,
        } => {
            let contents = toml::to_string_pretty(&config)
                .map_err(|e| AppError::config(format!("Failed to serialize config: {}", e)))?;
            println!("# {}", config_path.display());
            print!("{contents}");
            Ok(())
        }
        Commands::Config {
            action: ConfigAction::Reset,
        } => Ok(()),
    }
}
