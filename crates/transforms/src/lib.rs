//! Angle helpers and line rasterization shared across the autonomy stack.

use std::f64::consts::PI;

/// Normalize an angle to `[-pi, pi]`.
pub fn normalize_angle(angle: f64) -> f64 {
    let mut a = angle % (2.0 * PI);
    if a > PI {
        a -= 2.0 * PI;
    } else if a < -PI {
        a += 2.0 * PI;
    }
    a
}

/// Shortest signed difference `a - b`, normalized to `[-pi, pi]`.
pub fn angle_diff(a: f64, b: f64) -> f64 {
    normalize_angle(a - b)
}

/// Integer grid cell visited by a Bresenham rasterization.
pub type Cell = (i64, i64);

/// Cells traversed by a Bresenham line from `from` to `to`, inclusive of
/// both endpoints. Shared by the occupancy grid's ray-cast and anything
/// else that needs to walk a straight line over a discrete grid.
pub fn bresenham_line(from: Cell, to: Cell) -> Vec<Cell> {
    let (mut x0, mut y0) = from;
    let (x1, y1) = to;
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    let mut cells = Vec::new();
    loop {
        cells.push((x0, y0));
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_normalize_angle_within_range() {
        assert_relative_eq!(normalize_angle(0.0), 0.0);
        assert_relative_eq!(normalize_angle(PI), PI, epsilon = 1e-9);
        assert_relative_eq!(normalize_angle(3.0 * PI), -PI, epsilon = 1e-9);
        assert_relative_eq!(normalize_angle(-3.0 * PI), -PI, epsilon = 1e-9);
    }

    #[test]
    fn test_angle_diff_shortest_path() {
        assert_relative_eq!(angle_diff(0.1, -0.1), 0.2, epsilon = 1e-9);
        // wrap-around: just past +pi minus just before -pi is a small step
        assert_relative_eq!(
            angle_diff(-PI + 0.1, PI - 0.1),
            0.2,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_bresenham_line_horizontal() {
        let cells = bresenham_line((0, 0), (4, 0));
        assert_eq!(
            cells,
            vec![(0, 0), (1, 0), (2, 0), (3, 0), (4, 0)]
        );
    }

    #[test]
    fn test_bresenham_line_diagonal() {
        let cells = bresenham_line((0, 0), (3, 3));
        assert_eq!(cells.first(), Some(&(0, 0)));
        assert_eq!(cells.last(), Some(&(3, 3)));
        assert_eq!(cells.len(), 4);
    }

    #[test]
    fn test_bresenham_line_single_point() {
        let cells = bresenham_line((2, 2), (2, 2));
        assert_eq!(cells, vec![(2, 2)]);
    }
}
