use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

use garden_assistant::{chat, config::Config, constants::DEFAULT_PORT, web_server};

// Define the command-line interface structure using clap
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the gardening assistant web UI.
    Serve {
        #[arg(long, default_value_t = DEFAULT_PORT, help = "Port for the web server.")]
        port: u16,
        #[arg(long, default_value = "templates", help = "Directory holding the page templates.")]
        templates_dir: PathBuf,
        #[arg(long, default_value = "static", help = "Directory holding the browser assets.")]
        static_dir: PathBuf,
        #[command(flatten)]
        config: Config,
    },
    /// Chat with the gardening assistant in the terminal.
    Chat {
        #[arg(long, help = "Optional garden location used to tailor advice.")]
        address: Option<String>,
        #[command(flatten)]
        config: Config,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (for API keys)
    dotenvy::dotenv().ok();

    // Reads log level from RUST_LOG (e.g., RUST_LOG=info,garden_assistant=debug)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    info!("Garden assistant starting with command: {:?}", cli.command);

    match cli.command {
        Commands::Serve {
            port,
            templates_dir,
            static_dir,
            config,
        } => {
            let state = web_server::AppState::new(config, templates_dir);
            let mut web_server_handle = tokio::spawn(async move {
                if let Err(e) = web_server::start_web_server(port, state, &static_dir).await {
                    error!("Web server failed: {:?}", e);
                }
            });

            let ctrl_c = tokio::signal::ctrl_c();
            tokio::pin!(ctrl_c);

            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Ctrl-C received, shutting down...");
                }
                res = &mut web_server_handle => {
                    match res {
                        Ok(_) => info!("Web server task completed unexpectedly."),
                        Err(e) if e.is_panic() => error!("Web server task panicked: {:?}", e),
                        Err(e) => error!("Web server task failed: {:?}", e),
                    }
                }
            }

            if !web_server_handle.is_finished() {
                info!("Aborting web server task...");
                web_server_handle.abort();
            }
            info!("Shutdown complete.");
        }
        Commands::Chat { address, config } => {
            let (controller, events) = config.controller(reqwest::Client::new());
            chat::run_terminal_chat(controller, events, address)
                .await
                .context("Chat session failed")?;
        }
    }

    Ok(())
}
