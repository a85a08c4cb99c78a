use anyhow::Context;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "wa-bridge")]
#[command(about = "WhatsApp webhook to text-generation reply bridge", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Run the webhook server. Credentials are validated first; the server does not start if any are missing.
    Serve {
        /// Config file path (default: WA_BRIDGE_CONFIG_PATH or ./config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from PORT, config, or 3000)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Validate configuration and environment, then print a summary without secrets.
    Check {
        /// Config file path (default: WA_BRIDGE_CONFIG_PATH or ./config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("wa-bridge {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("serve failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Check { config }) => {
            if let Err(e) = run_check(config) {
                log::error!("check failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn load_settings(config_path: Option<std::path::PathBuf>) -> anyhow::Result<bridge::config::Settings> {
    let (config, path) = bridge::config::load_config(config_path)?;
    bridge::config::Settings::resolve(&config)
        .with_context(|| format!("invalid configuration (config file: {})", path.display()))
}

async fn run_serve(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let mut settings = load_settings(config_path)?;
    if let Some(p) = port {
        settings.server.port = p;
    }
    log::info!("starting bridge: {}", settings.summary());
    bridge::webhook::run_server(settings).await
}

fn run_check(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let settings = load_settings(config_path)?;
    bridge::webhook::build_bridge(&settings)?;
    println!("configuration ok: {}", settings.summary());
    Ok(())
}
