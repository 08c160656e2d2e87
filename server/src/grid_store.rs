//! Authoritative grid state and its durable snapshot
//!
//! The grid is a fixed-length vector of N² cells. A cell moves from
//! unclaimed to claimed exactly once; `try_set_if_unclaimed` is the only
//! way to write a cell, so the write-once invariant lives in one place.
//!
//! Snapshots are a JSON array with one entry per cell (`null` for unclaimed
//! cells). Reading a snapshot never fails startup: anything missing,
//! unreadable or malformed falls back to an empty grid.

use crate::utils::temp_path_for;
use log::{info, warn};
use shared::{total_cells, Cell, CellOwner};
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

/// Errors raised while reading or writing a grid snapshot
#[derive(Debug)]
pub enum StoreError {
    Io(io::Error),
    Encoding(serde_json::Error),
    SizeMismatch { expected: usize, found: usize },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "snapshot I/O error: {e}"),
            Self::Encoding(e) => write!(f, "snapshot encoding error: {e}"),
            Self::SizeMismatch { expected, found } => write!(
                f,
                "snapshot holds {found} cells but the grid has {expected}"
            ),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Encoding(e) => Some(e),
            Self::SizeMismatch { .. } => None,
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Encoding(e)
    }
}

/// Owns the grid cells
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridStore {
    side: usize,
    cells: Vec<Cell>,
}

impl GridStore {
    /// Creates an all-unclaimed grid of `side` × `side` cells
    pub fn new(side: usize) -> Self {
        Self {
            side,
            cells: vec![None; total_cells(side)],
        }
    }

    /// Builds a grid from existing cells, rejecting a length that does not
    /// match the configured side.
    pub fn from_cells(side: usize, cells: Vec<Cell>) -> Result<Self, StoreError> {
        let expected = total_cells(side);
        if cells.len() != expected {
            return Err(StoreError::SizeMismatch {
                expected,
                found: cells.len(),
            });
        }
        Ok(Self { side, cells })
    }

    /// Restores the grid from the snapshot at `path`.
    ///
    /// Falls back to a fresh grid when the snapshot is absent, unreadable,
    /// malformed or sized for a different grid. The failure is logged and
    /// otherwise ignored.
    pub fn load(path: &Path, side: usize) -> Self {
        match read_snapshot(path, side) {
            Ok(Some(store)) => {
                info!(
                    "Restored grid state from {} ({} of {} cells claimed)",
                    path.display(),
                    store.claimed_count(),
                    store.len()
                );
                store
            }
            Ok(None) => {
                info!(
                    "No grid state at {}, starting with an empty {}x{} grid",
                    path.display(),
                    side,
                    side
                );
                Self::new(side)
            }
            Err(e) => {
                warn!(
                    "Failed to load grid state from {}: {}; starting with an empty grid",
                    path.display(),
                    e
                );
                Self::new(side)
            }
        }
    }

    pub fn side(&self) -> usize {
        self.side
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Maps a client-supplied cell id to an index, or None when out of range
    pub fn index_of(&self, cell_id: i64) -> Option<usize> {
        usize::try_from(cell_id)
            .ok()
            .filter(|&index| index < self.cells.len())
    }

    pub fn get(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    /// Claims the cell for `owner` if nobody holds it yet.
    ///
    /// Returns false without touching the grid when the cell is already
    /// claimed or the index is out of range.
    pub fn try_set_if_unclaimed(&mut self, index: usize, owner: CellOwner) -> bool {
        match self.cells.get_mut(index) {
            Some(cell) if cell.is_none() => {
                *cell = Some(owner);
                true
            }
            _ => false,
        }
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Copy of the cells for handing off to the snapshot writer
    pub fn snapshot(&self) -> Arc<Vec<Cell>> {
        Arc::new(self.cells.clone())
    }

    pub fn claimed_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_some()).count()
    }

    /// Highest capture timestamp in the grid, 0 for an empty grid
    pub fn latest_timestamp(&self) -> u64 {
        self.cells
            .iter()
            .flatten()
            .map(|owner| owner.timestamp)
            .max()
            .unwrap_or(0)
    }
}

/// Reads a snapshot; `Ok(None)` when no snapshot file exists
pub fn read_snapshot(path: &Path, side: usize) -> Result<Option<GridStore>, StoreError> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let cells: Vec<Cell> = serde_json::from_str(&data)?;
    GridStore::from_cells(side, cells).map(Some)
}

/// Writes the full grid to `path`, replacing the previous snapshot.
///
/// The data lands in a sibling temporary file first and is renamed into
/// place, so readers never observe a half-written snapshot.
pub fn save_snapshot(path: &Path, cells: &[Cell]) -> Result<(), StoreError> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }

    let data = serde_json::to_vec(cells)?;
    let tmp = temp_path_for(path);
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
