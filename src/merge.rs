use crate::geom::{sq_dist, Geometry, IntPath};

/// One toolpath vertex in engine units. `z` is meaningful only in
/// per-point-Z (angled cutter) emission and stays zero otherwise.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CamPoint {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl CamPoint {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y, z: 0 }
    }

    pub fn xy(&self) -> (i64, i64) {
        (self.x, self.y)
    }
}

/// A finished travel path: closed (first point repeated at the end) unless
/// empty. `safe_to_close` records whether the tool can stay down when
/// re-entering this path, e.g. for the next depth pass.
#[derive(Clone, Debug)]
pub struct CamPath {
    pub points: Vec<CamPoint>,
    pub safe_to_close: bool,
}

/// Whether travelling the straight segment p1-p2 leaves the permitted
/// region. No bounds means every transition needs a retract; a zero-length
/// segment never crosses.
pub fn crosses(bounds: Option<&Geometry>, p1: (i64, i64), p2: (i64, i64)) -> bool {
    let Some(bounds) = bounds else {
        return true;
    };
    if p1 == p2 {
        return false;
    }
    if bounds.is_empty() {
        return true;
    }
    !bounds.segment_inside(p1, p2)
}

/// Joins disjoint loops into the fewest continuous travel paths that stay
/// within `bounds`. Greedy nearest-neighbor over every remaining loop point;
/// the chosen loop is rotated to start at that point, closed, and either
/// spliced onto the current path or started as a new one when the connecting
/// segment crosses the bounds.
pub fn merge_paths(bounds: Option<&Geometry>, loops: &[IntPath]) -> Vec<CamPath> {
    let mut pending: Vec<Vec<(i64, i64)>> = loops
        .iter()
        .map(|l| {
            l.iter()
                .map(|p| (p.x_scaled(), p.y_scaled()))
                .collect::<Vec<_>>()
        })
        .filter(|l| !l.is_empty())
        .collect();
    if pending.is_empty() {
        return Vec::new();
    }

    let mut current = std::mem::take(&mut pending[0]);
    current.push(current[0]);
    let mut cursor = current[current.len() - 1];

    let mut merged: Vec<Vec<(i64, i64)>> = Vec::new();
    let mut num_left = pending.len() - 1;

    while num_left > 0 {
        let mut best: Option<(usize, usize, i128)> = None;
        for (pi, path) in pending.iter().enumerate() {
            for (qi, &q) in path.iter().enumerate() {
                let d = sq_dist(cursor, q);
                if best.is_none_or(|(_, _, bd)| d < bd) {
                    best = Some((pi, qi, d));
                }
            }
        }
        let Some((pi, qi, _)) = best else {
            break;
        };

        let mut path = std::mem::take(&mut pending[pi]);
        num_left -= 1;

        let need_new = crosses(bounds, cursor, path[qi]);
        path.rotate_left(qi);
        path.push(path[0]);

        if need_new {
            merged.push(std::mem::replace(&mut current, path));
        } else {
            current.extend_from_slice(&path);
        }
        cursor = current[current.len() - 1];
    }
    merged.push(current);

    merged
        .into_iter()
        .map(|path| {
            let safe_to_close = !crosses(bounds, path[path.len() - 1], path[0]);
            CamPath {
                points: path
                    .into_iter()
                    .map(|(x, y)| CamPoint::new(x, y))
                    .collect(),
                safe_to_close,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Geometry;
    use crate::test_helpers::{ipath, square_geometry};

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(merge_paths(None, &[]).is_empty());
    }

    #[test]
    fn disjoint_loops_without_bounds_stay_separate() {
        let a = ipath(&[[0, 0], [10, 0], [10, 10], [0, 10]]);
        let b = ipath(&[[100, 100], [110, 100], [110, 110], [100, 110]]);

        let result = merge_paths(None, &[a, b]);
        assert_eq!(result.len(), 2);
        for path in &result {
            assert!(!path.safe_to_close);
            assert_eq!(path.points.first(), path.points.last(), "closed loop");
        }
    }

    #[test]
    fn loops_inside_bounds_splice_into_one_path() {
        let bounds = square_geometry(0, 0, 100);
        let outer = ipath(&[[10, 10], [90, 10], [90, 90], [10, 90]]);
        let inner = ipath(&[[40, 40], [60, 40], [60, 60], [40, 60]]);

        let result = merge_paths(Some(&bounds), &[inner, outer]);
        assert_eq!(result.len(), 1);
        let path = &result[0];
        assert!(path.safe_to_close);
        // Both loops' points are present in one spliced path.
        assert!(path.points.contains(&CamPoint::new(40, 40)));
        assert!(path.points.contains(&CamPoint::new(90, 90)));
    }

    #[test]
    fn splice_starts_at_nearest_point_of_next_loop() {
        let bounds = square_geometry(0, 0, 200);
        let first = ipath(&[[10, 10], [20, 10], [20, 20], [10, 20]]);
        // Nearest point of the second loop to the first loop's closing
        // point (10, 10) is (30, 10).
        let second = ipath(&[[100, 100], [30, 10], [100, 10]]);

        let result = merge_paths(Some(&bounds), &[first, second]);
        assert_eq!(result.len(), 1);
        let pts = &result[0].points;
        // First loop closed: [.., (10,10)], then the rotated second loop
        // begins at its nearest point.
        let close_idx = 4;
        assert_eq!(pts[close_idx], CamPoint::new(10, 10));
        assert_eq!(pts[close_idx + 1], CamPoint::new(30, 10));
        assert_eq!(pts.last(), Some(&CamPoint::new(30, 10)), "rotated loop closes on its start");
    }

    #[test]
    fn crossing_transition_starts_a_new_path() {
        // Two loops in separate lobes of the permitted region: the connecting
        // segment must leave it.
        let left = square_geometry(0, 0, 40);
        let right = square_geometry(100, 0, 40);
        let bounds = left.union(&right).expect("union");

        let a = ipath(&[[10, 10], [30, 10], [30, 30], [10, 30]]);
        let b = ipath(&[[110, 10], [130, 10], [130, 30], [110, 30]]);

        let result = merge_paths(Some(&bounds), &[a, b]);
        assert_eq!(result.len(), 2);
        for path in &result {
            assert!(path.safe_to_close, "each loop closes within its own lobe");
        }
    }

    #[test]
    fn safe_to_close_matches_crossing_test() {
        let bounds = square_geometry(0, 0, 100);
        let loops = vec![
            ipath(&[[10, 10], [90, 10], [90, 90], [10, 90]]),
            ipath(&[[30, 30], [70, 30], [70, 70], [30, 70]]),
        ];
        for path in merge_paths(Some(&bounds), &loops) {
            let first = path.points[0].xy();
            let last = path.points[path.points.len() - 1].xy();
            assert_eq!(path.safe_to_close, !crosses(Some(&bounds), last, first));
        }
    }

    #[test]
    fn crosses_degenerate_cases() {
        let bounds = square_geometry(0, 0, 100);
        assert!(crosses(None, (0, 0), (0, 0)), "null bounds always crosses");
        assert!(!crosses(Some(&bounds), (500, 500), (500, 500)), "zero-length never crosses");
        assert!(crosses(Some(&Geometry::empty()), (10, 10), (20, 20)), "empty bounds always crosses");
    }
}
