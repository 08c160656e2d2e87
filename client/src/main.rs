use clap::Parser;
use client::{ClientError, GridClient, GridMirror};
use log::{info, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// WebSocket endpoint of the server
    #[arg(short = 's', long, default_value = "ws://127.0.0.1:3001/ws")]
    server: String,

    /// Name shown on the leaderboard
    #[arg(short = 'u', long)]
    username: Option<String>,

    /// Cell color, random when omitted
    #[arg(short = 'c', long)]
    color: Option<String>,

    /// Number of capture attempts before exiting
    #[arg(short = 'n', long, default_value = "50")]
    captures: usize,

    /// Pause between capture attempts in milliseconds
    #[arg(short = 'i', long, default_value = "250")]
    interval_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let username = args
        .username
        .unwrap_or_else(|| format!("bot-{}", rand::thread_rng().gen_range(1000..10000)));
    let color = args.color.unwrap_or_else(random_color);
    let interval = Duration::from_millis(args.interval_ms);

    info!("Connecting to {} as {} ({})", args.server, username, color);
    let mut client = GridClient::connect(&args.server).await?;
    let mut mirror = GridMirror::new();

    client.join(Some(&username), Some(&color)).await?;
    while !mirror.is_initialized() {
        let event = client.next_event_timeout(Duration::from_secs(5)).await?;
        mirror.apply(&event);
    }
    info!("Joined a grid of {} cells", mirror.cells().len());

    for _ in 0..args.captures {
        let Some(cell_id) = pick_cell(&mirror.unclaimed_cells()) else {
            info!("No unclaimed cells left");
            break;
        };
        client.capture(cell_id as i64).await?;
        drain_events(&mut client, &mut mirror, interval).await?;
    }

    info!("Finished with {} cells", mirror.count_owned_by(&username));
    for (rank, entry) in mirror.leaderboard().iter().enumerate() {
        info!("{:>2}. {} ({}) {}", rank + 1, entry.username, entry.color, entry.count);
    }

    client.close().await?;
    Ok(())
}

/// Applies incoming events until `wait` has elapsed
async fn drain_events(
    client: &mut GridClient,
    mirror: &mut GridMirror,
    wait: Duration,
) -> Result<(), ClientError> {
    let deadline = Instant::now() + wait;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match client.next_event_timeout(remaining).await {
            Ok(event) => mirror.apply(&event),
            Err(ClientError::Timeout) => return Ok(()),
            Err(ClientError::Protocol(e)) => warn!("Ignoring malformed server event: {}", e),
            Err(e) => return Err(e),
        }
    }
}

fn pick_cell(unclaimed: &[usize]) -> Option<usize> {
    unclaimed.choose(&mut rand::thread_rng()).copied()
}

fn random_color() -> String {
    let mut rng = rand::thread_rng();
    format!(
        "#{:02x}{:02x}{:02x}",
        rng.gen::<u8>(),
        rng.gen::<u8>(),
        rng.gen::<u8>()
    )
}
