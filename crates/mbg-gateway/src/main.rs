//! mbg-gateway: Messaging Bot Gateway Main Binary
//!
//! Main entry point for the messaging-bot gateway.
//!
//! Usage:
//!   mbg-gateway           - Start the gateway (UI control channel + sessions)
//!   mbg-gateway --help    - Show help
//!   mbg-gateway --version - Show version

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use mbg_core::transport::memory::MemoryConnector;
use mbg_core::{GatewayConfig, SharedMode};
use mbg_session::{SessionLauncher, SessionRegistry};

/// Run mode
enum RunMode {
    /// Gateway mode (UI control channel + sessions)
    Server,
    /// Show help
    Help,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    match parse_args() {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("mbg-gateway {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        RunMode::Server => {}
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // Load .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config = GatewayConfig::load().map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    tracing::info!("Starting mbg-gateway...");
    tracing::info!("Sessions directory: {}", config.sessions_dir);

    run_server(config).await
}

/// Parse command line arguments
fn parse_args() -> RunMode {
    let args: Vec<String> = std::env::args().collect();

    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => return RunMode::Help,
            "--version" | "-v" => return RunMode::Version,
            _ => {}
        }
    }

    RunMode::Server
}

/// Print help message
fn print_help() {
    println!("mbg-gateway - Messaging Bot Gateway");
    println!();
    println!("Usage:");
    println!("  mbg-gateway           Start the gateway");
    println!("  mbg-gateway --help    Show this help message");
    println!("  mbg-gateway --version Show version");
    println!();
    println!("Environment Variables:");
    println!("  OWNER_NAME            Display name of the global owner");
    println!("  OWNER_NUMBER          Phone number of the global owner");
    println!("  BOT_NAME              Name the bot signs its replies with");
    println!("  COMMAND_PREFIX        Command prefix character (default: .)");
    println!("  SESSIONS_DIR          Session credential directory (default: sessions)");
    println!("  PORT                  UI control channel port (default: 3000)");
    println!("  GATEWAY_MODE          Initial access mode: public or private");
}

/// Run the gateway: session supervisor plus UI control channel
async fn run_server(config: GatewayConfig) -> anyhow::Result<()> {
    let mode = SharedMode::new(config.mode);
    let registry = SessionRegistry::new(&config.sessions_dir);
    let port = config.port;

    // Loopback transport; a protocol connector slots in through the same
    // trait object
    let connector = Arc::new(MemoryConnector::new());
    let launcher = SessionLauncher::new(registry, connector, Arc::new(config), mode);

    let ws_launcher = launcher.clone();
    let server = tokio::spawn(async move {
        if let Err(e) = mbg_ws::start_ws_server(port, ws_launcher).await {
            tracing::error!("UI control channel error: {}", e);
        }
    });
    tracing::info!("UI control channel started on port {}", port);

    tracing::info!("mbg-gateway initialized successfully");
    tracing::info!("Press Ctrl+C to exit");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    server.abort();

    // Close every live session before exit
    for summary in launcher.registry().list().await.unwrap_or_default() {
        if !summary.online {
            continue;
        }
        if let Some(session) = launcher.registry().find_by_folder(&summary.folder).await {
            session.stop_ghosts().await;
            if let Err(e) = session.transport.close().await {
                tracing::warn!("Error closing session {}: {}", session.id, e);
            }
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
