//! Map persistence: save/load/list/delete/rename saved occupancy grids.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use types::MapSummary;

use crate::grid::OccupancyGrid;
use crate::MapError;

#[derive(Debug, Serialize, Deserialize)]
struct PersistedGrid {
    version: u32,
    resolution: f64,
    size_m: f64,
    cells: usize,
    scan_count: u64,
    grid: Vec<u8>,
    walls: Vec<types::Wall>,
    corners: Vec<types::Corner>,
}

/// Directory of saved occupancy-grid maps, each backed by a `.json` grid
/// file and a `.meta.json` sidecar for fast listing.
pub struct MapStore {
    dir: PathBuf,
}

impl MapStore {
    pub fn new(maps_dir: impl Into<PathBuf>) -> Result<Self, MapError> {
        let dir = maps_dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn grid_path(&self, safe_name: &str) -> PathBuf {
        self.dir.join(format!("{safe_name}.json"))
    }

    fn meta_path(&self, safe_name: &str) -> PathBuf {
        self.dir.join(format!("{safe_name}.meta.json"))
    }

    pub fn save(&self, grid: &mut OccupancyGrid, name: &str, saved_at: &str) -> Result<(), MapError> {
        let safe_name = sanitize_name(name);
        grid.detect_walls_and_corners();

        let persisted = PersistedGrid {
            version: 1,
            resolution: grid.resolution,
            size_m: grid.size_m,
            cells: grid.cells,
            scan_count: grid.scan_count,
            grid: grid.cells_raw().to_vec(),
            walls: grid.walls.clone(),
            corners: grid.corners.clone(),
        };
        fs::write(self.grid_path(&safe_name), serde_json::to_vec(&persisted)?)?;

        let meta = MapSummary {
            name: name.to_string(),
            filename: format!("{safe_name}.json"),
            saved: saved_at.to_string(),
            stats: grid.stats(),
            room_bounds: grid.room_bounds(),
        };
        fs::write(self.meta_path(&safe_name), serde_json::to_vec(&meta)?)?;
        Ok(())
    }

    pub fn load(&self, name: &str) -> Result<OccupancyGrid, MapError> {
        let safe_name = sanitize_name(name);
        let path = self.grid_path(&safe_name);
        if !path.exists() {
            return Err(MapError::NotFound(name.to_string()));
        }
        let bytes = fs::read(path)?;
        let persisted: PersistedGrid = serde_json::from_slice(&bytes)?;

        let mut grid = OccupancyGrid::new(persisted.size_m, persisted.resolution);
        grid.load_raw(persisted.cells, persisted.scan_count, persisted.grid);
        grid.walls = persisted.walls;
        grid.corners = persisted.corners;
        Ok(grid)
    }

    pub fn delete(&self, name: &str) -> Result<bool, MapError> {
        let safe_name = sanitize_name(name);
        let mut deleted = false;
        for ext in ["json", "meta.json", "png"] {
            let path = self.dir.join(format!("{safe_name}.{ext}"));
            if path.exists() {
                fs::remove_file(path)?;
                deleted = true;
            }
        }
        Ok(deleted)
    }

    pub fn list(&self) -> Result<Vec<MapSummary>, MapError> {
        let mut maps = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            let is_meta = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.ends_with(".meta.json"))
                .unwrap_or(false);
            if !is_meta {
                continue;
            }
            let Ok(bytes) = fs::read(&path) else {
                continue;
            };
            if let Ok(meta) = serde_json::from_slice::<MapSummary>(&bytes) {
                maps.push(meta);
            }
        }
        maps.sort_by(|a, b| b.saved.cmp(&a.saved));
        Ok(maps)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.grid_path(&sanitize_name(name)).exists()
    }

    pub fn rename(&self, old_name: &str, new_name: &str) -> Result<(), MapError> {
        let old_safe = sanitize_name(old_name);
        let new_safe = sanitize_name(new_name);
        for ext in ["json", "meta.json", "png"] {
            let old_path = self.dir.join(format!("{old_safe}.{ext}"));
            let new_path = self.dir.join(format!("{new_safe}.{ext}"));
            if old_path.exists() {
                fs::rename(old_path, new_path)?;
            }
        }
        let meta_path = self.meta_path(&new_safe);
        if meta_path.exists() {
            let bytes = fs::read(&meta_path)?;
            let mut meta: MapSummary = serde_json::from_slice(&bytes)?;
            meta.name = new_name.to_string();
            meta.filename = format!("{new_safe}.json");
            fs::write(&meta_path, serde_json::to_vec(&meta)?)?;
        }
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Keep alphanumerics, `-`, `_`, and spaces; drop everything else; trim;
/// collapse spaces to `_`; lowercase; empty becomes `"unnamed"`.
pub fn sanitize_name(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_' || *c == ' ')
        .collect();
    let safe = kept.trim().replace(' ', "_").to_lowercase();
    if safe.is_empty() {
        "unnamed".to_string()
    } else {
        safe
    }
}
