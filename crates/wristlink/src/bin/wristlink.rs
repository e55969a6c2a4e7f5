//! wristlink CLI
//!
//! Usage:
//!   wristlink run [-c config]               # Poll weather and push it to the watch
//!   wristlink relay <response> [-c config]  # Forward a settings page result
//!   wristlink settings [-c config]          # Open the settings page

use argh::FromArgs;
use std::path::PathBuf;
use wristlink::config::default_config_path;
use wristlink::relay::SystemOpener;
use wristlink::runner;

/// wristlink - weather and settings companion for a wearable watchface
#[derive(FromArgs)]
struct Args {
    /// show version information
    #[argh(switch, short = 'V')]
    version: bool,

    #[argh(subcommand)]
    command: Option<Command>,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Run(RunArgs),
    Relay(RelayArgs),
    Settings(SettingsArgs),
}

/// Poll weather and push it to the watch until Ctrl+C
#[derive(FromArgs)]
#[argh(subcommand, name = "run")]
struct RunArgs {
    /// path to YAML configuration file
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,
}

/// Forward a settings page close response to the watch
#[derive(FromArgs)]
#[argh(subcommand, name = "relay")]
struct RelayArgs {
    /// percent-encoded JSON response from the settings page (may be empty)
    #[argh(positional, default = "String::new()")]
    response: String,

    /// path to YAML configuration file
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,
}

/// Open the settings page in the browser
#[derive(FromArgs)]
#[argh(subcommand, name = "settings")]
struct SettingsArgs {
    /// path to YAML configuration file
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();

    if args.version {
        println!("wristlink {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    runner::setup_logging();

    match args.command {
        Some(Command::Run(run)) => {
            let config = runner::load(&run.config.unwrap_or_else(default_config_path))?;
            let poller = runner::build_poller(&config)?;
            let (_shutdown_tx, shutdown_rx) = runner::setup_shutdown()?;

            log::info!("Weather poller running. Press Ctrl+C to stop.");
            poller.run(shutdown_rx).await;
        }
        Some(Command::Relay(relay)) => {
            let config = runner::load(&relay.config.unwrap_or_else(default_config_path))?;
            runner::build_relay(&config)?
                .on_webview_closed(&relay.response)
                .await?;
        }
        Some(Command::Settings(settings)) => {
            let config = runner::load(&settings.config.unwrap_or_else(default_config_path))?;
            runner::build_relay(&config)?.show_configuration(&SystemOpener)?;
        }
        None => {
            eprintln!("No command given. Run `wristlink --help` for usage.");
        }
    }

    Ok(())
}
