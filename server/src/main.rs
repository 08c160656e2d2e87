use clap::builder::TypedValueParser;
use clap::Parser;
use log::{error, info};
use server::config::{CorsOrigin, ServerConfig};
use std::path::PathBuf;

/// Command line arguments, each with an environment variable fallback
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Interface to bind to
    #[arg(short = 'H', long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = shared::DEFAULT_PORT)]
    port: u16,

    /// Grid side length
    #[arg(
        short,
        long,
        env = "GRID_SIZE",
        default_value_t = shared::DEFAULT_GRID_SIZE,
        value_parser = clap::value_parser!(u16).range(1..=1024).map(usize::from)
    )]
    grid_size: usize,

    /// Allowed cross-origin source, `*` for any
    #[arg(long, env = "CORS_ORIGIN", default_value = "*", value_parser = CorsOrigin::parse)]
    cors_origin: CorsOrigin,

    /// Where the grid snapshot is stored
    #[arg(long, env = "GRID_STATE_PATH", default_value = "grid_state.json")]
    state_path: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ServerConfig {
        host: args.host,
        port: args.port,
        grid_size: args.grid_size,
        cors_origin: args.cors_origin,
        state_path: args.state_path,
    };

    info!(
        "Starting grid server: {}x{} grid, snapshot at {}",
        config.grid_size,
        config.grid_size,
        config.state_path.display()
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down gracefully...");
    };

    server::network::serve(config, shutdown).await
}
