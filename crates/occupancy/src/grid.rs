//! 2D occupancy grid: scan integration, frontier detection, wall/corner
//! extraction, and room metrics.

use std::collections::HashSet;
use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use transforms::bresenham_line;
use types::{Corner, Frontier, GridStats, RoomBounds, ScanFrame, Wall};

pub const UNKNOWN: u8 = 0;
pub const FREE: u8 = 1;
pub const OCCUPIED: u8 = 100;

/// Minimum length, in cells, of an occupied run to count as a wall.
const MIN_WALL_RUN: usize = 5;
/// Minimum size, in cells, of a frontier cluster to be reported.
const MIN_FRONTIER_CLUSTER: usize = 3;

/// Square 2D occupancy grid, origin at the centre cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OccupancyGrid {
    pub resolution: f64,
    pub size_m: f64,
    pub cells: usize,
    pub origin: usize,
    grid: Vec<u8>,
    pub scan_count: u64,
    pub walls: Vec<Wall>,
    pub corners: Vec<Corner>,
}

impl OccupancyGrid {
    pub fn new(size_m: f64, resolution: f64) -> Self {
        let cells = (size_m / resolution) as usize;
        Self {
            resolution,
            size_m,
            cells,
            origin: cells / 2,
            grid: vec![UNKNOWN; cells * cells],
            scan_count: 0,
            walls: Vec::new(),
            corners: Vec::new(),
        }
    }

    pub fn world_to_cell(&self, x: f64, y: f64) -> (i64, i64) {
        let col = (x / self.resolution).floor() as i64 + self.origin as i64;
        let row = (-y / self.resolution).floor() as i64 + self.origin as i64;
        (row, col)
    }

    pub fn cell_to_world(&self, row: i64, col: i64) -> (f64, f64) {
        let x = (col - self.origin as i64) as f64 * self.resolution;
        let y = -((row - self.origin as i64) as f64) * self.resolution;
        (x, y)
    }

    pub fn in_bounds(&self, row: i64, col: i64) -> bool {
        row >= 0 && col >= 0 && (row as usize) < self.cells && (col as usize) < self.cells
    }

    fn index(&self, row: i64, col: i64) -> usize {
        row as usize * self.cells + col as usize
    }

    pub fn get(&self, row: i64, col: i64) -> u8 {
        if !self.in_bounds(row, col) {
            return UNKNOWN;
        }
        self.grid[self.index(row, col)]
    }

    pub(crate) fn set(&mut self, row: i64, col: i64, value: u8) {
        if self.in_bounds(row, col) {
            let idx = self.index(row, col);
            self.grid[idx] = value;
        }
    }

    /// Directly write a cell value. Used to seed grids from a loaded map
    /// or in tests; normal updates should go through [`Self::update_from_scan`].
    pub fn set_cell(&mut self, row: i64, col: i64, value: u8) {
        self.set(row, col, value);
    }

    /// Raw cell buffer in row-major order, for publishing/persistence.
    pub fn cells_raw(&self) -> &[u8] {
        &self.grid
    }

    /// Restore a grid's cell buffer and counters from persisted data.
    /// Used only by [`crate::MapStore::load`].
    pub(crate) fn load_raw(&mut self, cells: usize, scan_count: u64, data: Vec<u8>) {
        debug_assert_eq!(cells, self.cells);
        self.grid = data;
        self.scan_count = scan_count;
    }

    /// Integrate a scan taken from `(rx, ry, rh)` into the grid.
    ///
    /// Frames with fewer than [`ScanFrame::MIN_POINTS`] usable points are
    /// the caller's concern to filter before calling this — see
    /// [`ScanFrame::is_usable`].
    pub fn update_from_scan(
        &mut self,
        rx: f64,
        ry: f64,
        rh: f64,
        frame: &ScanFrame,
        min_range: f64,
        max_range: f64,
    ) {
        let (r0, c0) = self.world_to_cell(rx, ry);
        for pt in &frame.points {
            if pt.distance_m < min_range || pt.distance_m > max_range {
                continue;
            }
            let angle = pt.angle_deg.to_radians() + rh;
            let ex = rx + pt.distance_m * angle.cos();
            let ey = ry + pt.distance_m * angle.sin();
            let (er, ec) = self.world_to_cell(ex, ey);

            for (r, c) in bresenham_line((r0, c0), (er, ec)) {
                if self.get(r, c) != OCCUPIED {
                    self.set(r, c, FREE);
                }
            }
            if self.in_bounds(er, ec) {
                self.set(er, ec, OCCUPIED);
            }
        }
        self.scan_count += 1;
    }

    /// Frontier clusters: `FREE` cells with an `UNKNOWN` 4-neighbour,
    /// flood-filled and filtered below [`MIN_FRONTIER_CLUSTER`].
    pub fn get_frontiers(&self) -> Vec<Frontier> {
        let n = self.cells as i64;
        let mut frontier_cells = HashSet::new();
        for r in 1..n - 1 {
            for c in 1..n - 1 {
                if self.get(r, c) != FREE {
                    continue;
                }
                let is_frontier = [(-1, 0), (1, 0), (0, -1), (0, 1)]
                    .iter()
                    .any(|(dr, dc)| self.get(r + dr, c + dc) == UNKNOWN);
                if is_frontier {
                    frontier_cells.insert((r, c));
                }
            }
        }
        if frontier_cells.is_empty() {
            return Vec::new();
        }

        let mut visited = HashSet::new();
        let mut clusters: Vec<Vec<(i64, i64)>> = Vec::new();
        for &cell in &frontier_cells {
            if visited.contains(&cell) {
                continue;
            }
            let mut cluster = Vec::new();
            let mut stack = vec![cell];
            while let Some((cr, cc)) = stack.pop() {
                if visited.contains(&(cr, cc)) {
                    continue;
                }
                visited.insert((cr, cc));
                cluster.push((cr, cc));
                for (dr, dc) in [(-1, 0), (1, 0), (0, -1), (0, 1)] {
                    let n2 = (cr + dr, cc + dc);
                    if !visited.contains(&n2) && frontier_cells.contains(&n2) {
                        stack.push(n2);
                    }
                }
            }
            if cluster.len() >= MIN_FRONTIER_CLUSTER {
                clusters.push(cluster);
            }
        }

        let mut out: Vec<Frontier> = clusters
            .into_iter()
            .map(|cluster| {
                let n = cluster.len() as f64;
                let avg_r = cluster.iter().map(|c| c.0).sum::<i64>() as f64 / n;
                let avg_c = cluster.iter().map(|c| c.1).sum::<i64>() as f64 / n;
                let (x, y) = self.cell_to_world(avg_r.round() as i64, avg_c.round() as i64);
                Frontier {
                    x,
                    y,
                    size: cluster.len(),
                }
            })
            .collect();
        out.sort_by(|a, b| b.size.cmp(&a.size));
        out
    }

    /// Recompute `walls` and `corners` from the current occupied cells.
    pub fn detect_walls_and_corners(&mut self) {
        let n = self.cells as i64;
        let mut occupied = Vec::new();
        for r in 0..n {
            for c in 0..n {
                if self.get(r, c) == OCCUPIED {
                    occupied.push((r, c));
                }
            }
        }
        if occupied.is_empty() {
            self.walls.clear();
            self.corners.clear();
            return;
        }
        occupied.sort();
        let occupied_set: HashSet<(i64, i64)> = occupied.iter().copied().collect();

        let h_runs = self.find_runs(&occupied, &occupied_set, Axis::Horizontal);
        let v_runs = self.find_runs(&occupied, &occupied_set, Axis::Vertical);

        let mut endpoints = HashSet::new();
        for run in h_runs.iter().chain(v_runs.iter()) {
            endpoints.insert(run.start);
            endpoints.insert(run.end);
        }

        let mut corners = Vec::new();
        for &pt in &endpoints {
            let has_h = h_runs.iter().any(|r| r.start == pt || r.end == pt);
            let has_v = v_runs.iter().any(|r| r.start == pt || r.end == pt);
            if has_h && has_v {
                let (x, y) = self.cell_to_world(pt.0, pt.1);
                corners.push(Corner { x, y });
            }
        }

        self.walls = h_runs
            .iter()
            .chain(v_runs.iter())
            .map(|run| {
                let (x1, y1) = self.cell_to_world(run.start.0, run.start.1);
                let (x2, y2) = self.cell_to_world(run.end.0, run.end.1);
                Wall { x1, y1, x2, y2 }
            })
            .collect();
        self.corners = corners;
    }

    fn find_runs(
        &self,
        sorted_occupied: &[(i64, i64)],
        occupied: &HashSet<(i64, i64)>,
        axis: Axis,
    ) -> Vec<Run> {
        let mut runs = Vec::new();
        let mut visited = HashSet::new();
        for &(r, c) in sorted_occupied {
            if visited.contains(&(r, c)) {
                continue;
            }
            let mut run = vec![(r, c)];
            visited.insert((r, c));
            let step = match axis {
                Axis::Horizontal => (0, 1),
                Axis::Vertical => (1, 0),
            };
            let mut next = (r + step.0, c + step.1);
            while occupied.contains(&next) && !visited.contains(&next) {
                run.push(next);
                visited.insert(next);
                next = (next.0 + step.0, next.1 + step.1);
            }
            if run.len() >= MIN_WALL_RUN {
                runs.push(Run {
                    start: run[0],
                    end: *run.last().unwrap(),
                });
            }
        }
        runs
    }

    pub fn stats(&self) -> GridStats {
        let total = self.cells * self.cells;
        let free_cells = self.grid.iter().filter(|&&v| v == FREE).count();
        let occupied_cells = self.grid.iter().filter(|&&v| v == OCCUPIED).count();
        let unknown_cells = total - free_cells - occupied_cells;
        let explored_pct = if total > 0 {
            (100.0 * (free_cells + occupied_cells) as f64 / total as f64 * 10.0).round() / 10.0
        } else {
            0.0
        };
        GridStats {
            free_cells,
            occupied_cells,
            unknown_cells,
            explored_pct,
            resolution_m: self.resolution,
            size_m: self.size_m,
            wall_count: self.walls.len(),
            corner_count: self.corners.len(),
        }
    }

    pub fn room_bounds(&self) -> Option<RoomBounds> {
        let n = self.cells as i64;
        let mut r_min = i64::MAX;
        let mut r_max = i64::MIN;
        let mut c_min = i64::MAX;
        let mut c_max = i64::MIN;
        let mut any = false;
        for r in 0..n {
            for c in 0..n {
                if self.get(r, c) == OCCUPIED {
                    any = true;
                    r_min = r_min.min(r);
                    r_max = r_max.max(r);
                    c_min = c_min.min(c);
                    c_max = c_max.max(c);
                }
            }
        }
        if !any {
            return None;
        }
        let (x_min, y_max) = self.cell_to_world(r_min, c_min);
        let (x_max, y_min) = self.cell_to_world(r_max, c_max);
        Some(RoomBounds {
            x_min,
            x_max,
            y_min,
            y_max,
        })
    }

    /// Score a candidate pose offset against scan endpoints for the
    /// translational scan-match correction (see `localization`). Returns
    /// the count of endpoints that land on an `OCCUPIED` cell.
    pub fn score_offset(
        &self,
        test_x: f64,
        test_y: f64,
        heading: f64,
        points: &[types::ScanPoint],
        min_range: f64,
        max_range: f64,
    ) -> usize {
        points
            .iter()
            .take(100)
            .filter(|pt| pt.distance_m >= min_range && pt.distance_m <= max_range)
            .filter(|pt| {
                let angle = pt.angle_deg.to_radians() + heading;
                let wx = test_x + pt.distance_m * angle.cos();
                let wy = test_y + pt.distance_m * angle.sin();
                let (r, c) = self.world_to_cell(wx, wy);
                self.in_bounds(r, c) && self.get(r, c) == OCCUPIED
            })
            .count()
    }
}

#[derive(Clone, Copy)]
enum Axis {
    Horizontal,
    Vertical,
}

struct Run {
    start: (i64, i64),
    end: (i64, i64),
}

/// atan2-based desired heading helper used by the exploration planner;
/// kept here since it operates purely on world coordinates and has no
/// other natural home.
pub fn heading_to(from_x: f64, from_y: f64, to_x: f64, to_y: f64) -> f64 {
    (to_y - from_y).atan2(to_x - from_x) - PI / 2.0
}
