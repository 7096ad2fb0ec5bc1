//! Shared helpers for autonomy stack integration tests.

use types::ScanPoint;

/// Synthetic LiDAR scan for a robot centered in a rectangular room.
pub fn generate_box_room_scan(width: f64, height: f64, num_points: usize) -> Vec<ScanPoint> {
    let angle_increment = 360.0 / num_points as f64;
    (0..num_points)
        .map(|i| {
            let angle_deg = -180.0 + i as f64 * angle_increment;
            let angle_rad = angle_deg.to_radians();
            let distance_m = compute_box_intersection(width, height, angle_rad);
            ScanPoint {
                angle_deg,
                distance_m,
                x_m: distance_m * angle_rad.cos(),
                y_m: distance_m * angle_rad.sin(),
            }
        })
        .collect()
}

/// Ray-box intersection distance from the box center.
fn compute_box_intersection(width: f64, height: f64, angle: f64) -> f64 {
    let half_width = width / 2.0;
    let half_height = height / 2.0;
    let cos_a = angle.cos();
    let sin_a = angle.sin();
    let mut min_dist = f64::INFINITY;

    if cos_a > 1e-6 {
        let t = half_width / cos_a;
        if (t * sin_a).abs() <= half_height {
            min_dist = min_dist.min(t);
        }
    }
    if cos_a < -1e-6 {
        let t = -half_width / cos_a;
        if (t * sin_a).abs() <= half_height {
            min_dist = min_dist.min(t);
        }
    }
    if sin_a > 1e-6 {
        let t = half_height / sin_a;
        if (t * cos_a).abs() <= half_width {
            min_dist = min_dist.min(t);
        }
    }
    if sin_a < -1e-6 {
        let t = -half_height / sin_a;
        if (t * cos_a).abs() <= half_width {
            min_dist = min_dist.min(t);
        }
    }

    min_dist
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_room_scan_generation() {
        let scan = generate_box_room_scan(10.0, 10.0, 360);
        assert_eq!(scan.len(), 360);
        let front = scan
            .iter()
            .min_by(|a, b| a.angle_deg.abs().partial_cmp(&b.angle_deg.abs()).unwrap())
            .unwrap();
        assert!((front.distance_m - 5.0).abs() < 0.1);
    }
}
