//! Grid A* search over an [`occupancy::OccupancyGrid`].

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use occupancy::{OccupancyGrid, FREE, OCCUPIED, UNKNOWN};

type Cell = (i64, i64);

const COST_FREE: u32 = 1;
const COST_UNKNOWN: u32 = 5;

fn step_cost(grid: &OccupancyGrid, cell: Cell) -> Option<u32> {
    match grid.get(cell.0, cell.1) {
        FREE => Some(COST_FREE),
        UNKNOWN => Some(COST_UNKNOWN),
        OCCUPIED => None,
        _ => None,
    }
}

fn manhattan(a: Cell, b: Cell) -> u32 {
    ((a.0 - b.0).abs() + (a.1 - b.1).abs()) as u32
}

#[derive(Eq, PartialEq)]
struct HeapEntry {
    f_score: u32,
    cell: Cell,
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap via reversed ordering on f_score.
        other.f_score.cmp(&self.f_score)
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Find a 4-connected path from `start` to `goal`, avoiding `OCCUPIED`
/// cells. Returns `None` if no path exists — the caller treats that as
/// "no waypoint", not a failure.
pub fn astar(grid: &OccupancyGrid, start: Cell, goal: Cell) -> Option<Vec<Cell>> {
    if step_cost(grid, goal).is_none() {
        return None;
    }

    let mut open = BinaryHeap::new();
    open.push(HeapEntry {
        f_score: manhattan(start, goal),
        cell: start,
    });

    let mut came_from: HashMap<Cell, Cell> = HashMap::new();
    let mut g_score: HashMap<Cell, u32> = HashMap::new();
    g_score.insert(start, 0);

    while let Some(HeapEntry { cell, .. }) = open.pop() {
        if cell == goal {
            return Some(reconstruct(&came_from, cell));
        }

        let current_g = *g_score.get(&cell).unwrap_or(&u32::MAX);
        for (dr, dc) in [(-1, 0), (1, 0), (0, -1), (0, 1)] {
            let neighbor = (cell.0 + dr, cell.1 + dc);
            if !grid.in_bounds(neighbor.0, neighbor.1) {
                continue;
            }
            let Some(cost) = step_cost(grid, neighbor) else {
                continue;
            };
            let tentative_g = current_g.saturating_add(cost);
            if tentative_g < *g_score.get(&neighbor).unwrap_or(&u32::MAX) {
                came_from.insert(neighbor, cell);
                g_score.insert(neighbor, tentative_g);
                open.push(HeapEntry {
                    f_score: tentative_g + manhattan(neighbor, goal),
                    cell: neighbor,
                });
            }
        }
    }

    None
}

fn reconstruct(came_from: &HashMap<Cell, Cell>, mut current: Cell) -> Vec<Cell> {
    let mut path = vec![current];
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}

/// Down-sample a path every 10 cells, keeping the final cell; returns the
/// path unchanged if it's already shorter than that.
pub fn downsample(path: &[Cell]) -> Vec<Cell> {
    if path.len() <= 10 {
        return path.to_vec();
    }
    let mut out: Vec<Cell> = path.iter().step_by(10).copied().collect();
    if out.last() != path.last() {
        out.push(*path.last().unwrap());
    }
    out
}
