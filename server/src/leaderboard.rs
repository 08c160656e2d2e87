//! Ranked capture counts derived from the grid
//!
//! Entries are grouped by username. Ordering is fully deterministic:
//! descending by count, and among equal counts the user whose first claimed
//! cell has the lowest index ranks first. The color shown for a user is the
//! color of that lowest-index cell. Identity is fixed per connection, but one
//! username can join from several connections with different colors, so a
//! single color per user is not assumed.

use shared::{Cell, LeaderboardEntry, LEADERBOARD_SIZE};
use std::collections::HashMap;

/// Computes the top entries for the given cells.
pub fn compute(cells: &[Cell]) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();

    for owner in cells.iter().flatten() {
        match positions.get(owner.username.as_str()) {
            Some(&position) => entries[position].count += 1,
            None => {
                positions.insert(owner.username.as_str(), entries.len());
                entries.push(LeaderboardEntry {
                    username: owner.username.clone(),
                    color: owner.color.clone(),
                    count: 1,
                });
            }
        }
    }

    // Stable sort keeps first-seen order among ties
    entries.sort_by(|a, b| b.count.cmp(&a.count));
    entries.truncate(LEADERBOARD_SIZE);
    entries
}
