use log::debug;
use shared::{Cell, CellOwner, LeaderboardEntry, ServerEvent};

/// Local replica of the server's grid, kept current from server events
#[derive(Debug, Clone, Default)]
pub struct GridMirror {
    cells: Vec<Cell>,
    leaderboard: Vec<LeaderboardEntry>,
    initialized: bool,
}

impl GridMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::GridInit(cells) => {
                self.cells = cells.clone();
                self.initialized = true;
            }
            ServerEvent::GridUpdate { cell_id, owner } => match self.cells.get_mut(*cell_id) {
                Some(cell) => *cell = Some(owner.clone()),
                None => debug!("Ignoring update for unknown cell {}", cell_id),
            },
            ServerEvent::LeaderboardUpdate(entries) => {
                self.leaderboard = entries.clone();
            }
        }
    }

    /// Whether a `grid:init` has been received yet
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn owner(&self, cell_id: usize) -> Option<&CellOwner> {
        self.cells.get(cell_id).and_then(Option::as_ref)
    }

    pub fn unclaimed_cells(&self) -> Vec<usize> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.is_none())
            .map(|(index, _)| index)
            .collect()
    }

    /// Number of cells in the mirror owned by `username`
    pub fn count_owned_by(&self, username: &str) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter(|owner| owner.username == username)
            .count()
    }

    pub fn leaderboard(&self) -> &[LeaderboardEntry] {
        &self.leaderboard
    }
}
