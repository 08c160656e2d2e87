//! Performance benchmarks for the capture path

use server::game::{CaptureCoordinator, CaptureOutcome};
use server::grid_store::GridStore;
use server::leaderboard;
use server::persistence::SnapshotWriter;
use server::session_registry::SessionId;
use server::transport::Transport;
use shared::{Cell, CellOwner, ServerEvent, DEFAULT_GRID_SIZE};
use std::time::Instant;

/// Transport that only counts what it would have sent
#[derive(Default)]
struct CountingTransport {
    sent: usize,
}

impl Transport for CountingTransport {
    fn send_to(&mut self, _session_id: SessionId, _event: &ServerEvent) {
        self.sent += 1;
    }

    fn broadcast(&mut self, _event: &ServerEvent) {
        self.sent += 1;
    }

    fn detach(&mut self, _session_id: SessionId) {}
}

fn full_grid(players: usize) -> Vec<Cell> {
    (0..DEFAULT_GRID_SIZE * DEFAULT_GRID_SIZE)
        .map(|index| {
            Some(CellOwner {
                username: format!("player-{}", index % players),
                color: "#123456".to_string(),
                timestamp: index as u64,
            })
        })
        .collect()
}

/// Benchmarks leaderboard aggregation over a fully claimed grid
#[test]
fn benchmark_leaderboard_full_grid() {
    let cells = full_grid(50);

    let iterations = 1_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let board = leaderboard::compute(&cells);
        assert_eq!(board.len(), shared::LEADERBOARD_SIZE);
    }

    let duration = start.elapsed();
    println!(
        "Leaderboard: {} iterations in {:?} ({:.2} µs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Generous bound so unoptimized builds pass
    assert!(duration.as_secs() < 10);
}

/// Benchmarks claiming every cell of a default-size grid through the coordinator
#[test]
fn benchmark_capture_throughput() {
    let (snapshots, _rx) = SnapshotWriter::channel();
    let mut coordinator = CaptureCoordinator::new(
        GridStore::new(DEFAULT_GRID_SIZE),
        CountingTransport::default(),
        snapshots,
    );

    let players: Vec<SessionId> = (0..8)
        .map(|n| {
            let id = coordinator.handle_connect("127.0.0.1:9000".parse().unwrap());
            coordinator.handle_join(id, Some(format!("player-{n}")), None);
            id
        })
        .collect();

    let total = DEFAULT_GRID_SIZE * DEFAULT_GRID_SIZE;
    let start = Instant::now();

    for cell_id in 0..total {
        let session = players[cell_id % players.len()];
        let outcome = coordinator.handle_capture(session, cell_id as i64);
        assert_eq!(outcome, CaptureOutcome::Captured);
    }

    let duration = start.elapsed();
    println!(
        "Captures: {} cells in {:?} ({:.2} µs/capture)",
        total,
        duration,
        duration.as_micros() as f64 / total as f64
    );

    assert_eq!(coordinator.grid().claimed_count(), total);
    // Two unicasts per join, two broadcasts per capture
    assert_eq!(coordinator.transport().sent, players.len() * 2 + total * 2);
    // Each capture rebuilds the leaderboard and snapshot over the whole grid
    assert!(duration.as_secs() < 60);
}

/// Repeated captures of claimed cells must stay cheap and change nothing
#[test]
fn stress_test_contended_cell() {
    let (snapshots, _rx) = SnapshotWriter::channel();
    let mut coordinator =
        CaptureCoordinator::new(GridStore::new(4), CountingTransport::default(), snapshots);
    let id = coordinator.handle_connect("127.0.0.1:9000".parse().unwrap());
    coordinator.handle_join(id, Some("alice".to_string()), None);

    assert_eq!(coordinator.handle_capture(id, 0), CaptureOutcome::Captured);

    let iterations = 100_000;
    let start = Instant::now();
    for _ in 0..iterations {
        assert_eq!(coordinator.handle_capture(id, 0), CaptureOutcome::AlreadyClaimed);
    }
    let duration = start.elapsed();
    println!("Rejected captures: {} in {:?}", iterations, duration);

    assert_eq!(coordinator.grid().claimed_count(), 1);
    assert!(duration.as_secs() < 10);
}
