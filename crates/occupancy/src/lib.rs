//! Occupancy grid mapping and map persistence.

mod grid;
mod mapstore;

pub use grid::{heading_to, OccupancyGrid, FREE, OCCUPIED, UNKNOWN};
pub use mapstore::{sanitize_name, MapStore};

/// Errors surfaced by grid persistence. Propagated as `anyhow::Error` at
/// the supervisor boundary.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("map not found: {0}")]
    NotFound(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
