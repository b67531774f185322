use clipper2::{ClipperError, EndType, FillRule, JoinType, One, Path, Paths, Point};

pub type IntPoint = Point<One>;
pub type IntPath = Path<One>;
pub type IntPaths = Paths<One>;

/// Fixed-point scale of the engine coordinate space.
pub const ENGINE_UNITS_PER_INCH: f64 = 100_000.0;
pub const ENGINE_UNITS_PER_MM: f64 = ENGINE_UNITS_PER_INCH / 25.4;

/// Vertex cleaning tolerance applied after every offset, in engine units.
pub const CLEAN_DIST: f64 = ENGINE_UNITS_PER_INCH / 100_000.0;

/// Distance below which a point counts as lying on a boundary edge.
/// Half an engine unit is 5 microinches; anything closer is noise from
/// rounding split points back to the integer grid.
const ON_EDGE_DIST: f64 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Inside,
    Boundary,
    Outside,
}

/// A set of closed polygon loops interpreted under the even-odd fill rule.
/// Holes are implicit from loop nesting, not flagged.
#[derive(Clone, Debug)]
pub struct Geometry {
    paths: IntPaths,
}

pub fn sq_dist(a: (i64, i64), b: (i64, i64)) -> i128 {
    let dx = (b.0 - a.0) as i128;
    let dy = (b.1 - a.1) as i128;
    dx * dx + dy * dy
}

fn loop_coords(path: &IntPath) -> Vec<(f64, f64)> {
    path.iter()
        .map(|pt| (pt.x_scaled() as f64, pt.y_scaled() as f64))
        .collect()
}

impl Geometry {
    pub fn new(paths: Vec<IntPath>) -> Self {
        Self {
            paths: IntPaths::new(paths),
        }
    }

    pub fn empty() -> Self {
        Self {
            paths: IntPaths::new(Vec::new()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IntPath> {
        self.paths.iter()
    }

    /// Grow (positive delta) or shrink (negative delta) by `delta` engine
    /// units, with round joins, then clean collinear/near-duplicate vertices.
    pub fn offset(&self, delta: f64) -> Self {
        Self {
            paths: self
                .paths
                .inflate(delta, JoinType::Round, EndType::Polygon, 2.0)
                .simplify(CLEAN_DIST, false),
        }
    }

    pub fn union(&self, other: &Self) -> Result<Self, ClipperError> {
        Ok(Self {
            paths: clipper2::union(self.paths.clone(), other.paths.clone(), FillRule::EvenOdd)?,
        })
    }

    pub fn intersect(&self, other: &Self) -> Result<Self, ClipperError> {
        Ok(Self {
            paths: clipper2::intersect(
                self.paths.clone(),
                other.paths.clone(),
                FillRule::EvenOdd,
            )?,
        })
    }

    pub fn difference(&self, other: &Self) -> Result<Self, ClipperError> {
        Ok(Self {
            paths: clipper2::difference(
                self.paths.clone(),
                other.paths.clone(),
                FillRule::EvenOdd,
            )?,
        })
    }

    pub fn xor(&self, other: &Self) -> Result<Self, ClipperError> {
        Ok(Self {
            paths: clipper2::xor(self.paths.clone(), other.paths.clone(), FillRule::EvenOdd)?,
        })
    }

    /// Even-odd classification of a point against every loop, with a
    /// half-unit boundary band.
    pub fn side_of(&self, x: f64, y: f64) -> Side {
        let mut inside = false;

        for path in self.paths.iter() {
            let coords = loop_coords(path);
            if coords.len() < 3 {
                continue;
            }

            let mut prev = coords[coords.len() - 1];
            for &cur in &coords {
                let (ax, ay) = prev;
                let (bx, by) = cur;
                prev = cur;

                // Boundary band: squared distance from (x, y) to edge a-b.
                let ex = bx - ax;
                let ey = by - ay;
                let len2 = ex * ex + ey * ey;
                let t = if len2 > 0.0 {
                    (((x - ax) * ex + (y - ay) * ey) / len2).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let dx = x - (ax + t * ex);
                let dy = y - (ay + t * ey);
                if dx * dx + dy * dy <= ON_EDGE_DIST * ON_EDGE_DIST {
                    return Side::Boundary;
                }

                // Ray cast toward +x.
                if (ay > y) != (by > y) {
                    let edge_x = ax + (y - ay) / (by - ay) * (bx - ax);
                    if edge_x > x {
                        inside = !inside;
                    }
                }
            }
        }

        if inside { Side::Inside } else { Side::Outside }
    }

    /// Parameters t in (0, 1) where the segment a-b meets a boundary edge,
    /// sorted and deduplicated. Collinear overlaps contribute the projected
    /// endpoints of the overlapping edge.
    pub fn crossing_params(&self, a: (f64, f64), b: (f64, f64)) -> Vec<f64> {
        let (dx, dy) = (b.0 - a.0, b.1 - a.1);
        let seg_len2 = dx * dx + dy * dy;
        let mut ts: Vec<f64> = Vec::new();
        if seg_len2 <= 0.0 {
            return ts;
        }

        for path in self.paths.iter() {
            let coords = loop_coords(path);
            if coords.len() < 2 {
                continue;
            }

            let mut prev = coords[coords.len() - 1];
            for &cur in &coords {
                let (cx, cy) = prev;
                let (ex, ey) = (cur.0 - prev.0, cur.1 - prev.1);
                prev = cur;

                let denom = dx * ey - dy * ex;
                let fx = cx - a.0;
                let fy = cy - a.1;

                if denom.abs() <= f64::EPSILON * seg_len2 {
                    // Parallel. Only collinear edges matter: project both edge
                    // endpoints onto the segment.
                    let edge_len = (ex * ex + ey * ey).sqrt();
                    if edge_len <= 0.0 {
                        continue;
                    }
                    let line_dist = (fx * dy - fy * dx).abs() / seg_len2.sqrt();
                    if line_dist > ON_EDGE_DIST {
                        continue;
                    }
                    for (px, py) in [(cx, cy), (cx + ex, cy + ey)] {
                        let t = ((px - a.0) * dx + (py - a.1) * dy) / seg_len2;
                        if t > 1e-9 && t < 1.0 - 1e-9 {
                            ts.push(t);
                        }
                    }
                } else {
                    let t = (fx * ey - fy * ex) / denom;
                    let u = (fx * dy - fy * dx) / denom;
                    if t > 1e-9 && t < 1.0 - 1e-9 && (-1e-9..=1.0 + 1e-9).contains(&u) {
                        ts.push(t);
                    }
                }
            }
        }

        ts.sort_by(|p, q| p.partial_cmp(q).unwrap_or(std::cmp::Ordering::Equal));
        ts.dedup_by(|p, q| (*p - *q).abs() < 1e-9);
        ts
    }

    /// Whether the whole segment a-b stays within this region (boundary
    /// included). Splits the segment at every boundary crossing and
    /// classifies each piece by its midpoint; a piece on the boundary counts
    /// as inside.
    pub fn segment_inside(&self, a: (i64, i64), b: (i64, i64)) -> bool {
        if self.is_empty() {
            return false;
        }
        let af = (a.0 as f64, a.1 as f64);
        let bf = (b.0 as f64, b.1 as f64);

        let mut ts = self.crossing_params(af, bf);
        ts.insert(0, 0.0);
        ts.push(1.0);

        for w in ts.windows(2) {
            let tm = (w[0] + w[1]) / 2.0;
            let mx = af.0 + tm * (bf.0 - af.0);
            let my = af.1 + tm * (bf.1 - af.1);
            if self.side_of(mx, my) == Side::Outside {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ipath, square_geometry};

    #[test]
    fn offset_shrink_then_grow_reconstructs_outer_boundary() {
        let square = square_geometry(0, 0, 100_000);
        let restored = square.offset(-10_000.0).offset(10_000.0);
        assert!(!restored.is_empty());

        let (mut min_x, mut max_x) = (i64::MAX, i64::MIN);
        for path in restored.iter() {
            for pt in path.iter() {
                min_x = min_x.min(pt.x_scaled());
                max_x = max_x.max(pt.x_scaled());
            }
        }
        // Round joins bow the corners slightly; edges land back on the
        // starting boundary within cleaning tolerance.
        assert!(min_x.abs() <= 2, "min_x = {min_x}");
        assert!((max_x - 100_000).abs() <= 2, "max_x = {max_x}");
    }

    #[test]
    fn shrink_past_half_width_empties() {
        let square = square_geometry(0, 0, 10_000);
        assert!(square.offset(-6_000.0).is_empty());
        assert!(!square.offset(-4_000.0).is_empty());
    }

    #[test]
    fn union_of_nested_loops_keeps_hole_under_even_odd() {
        let outer = square_geometry(0, 0, 100);
        let inner = square_geometry(25, 25, 50);
        let combined = outer.union(&inner).expect("union");
        assert_eq!(combined.len(), 2, "outer loop plus hole loop");
        assert_eq!(combined.side_of(10.0, 50.0), Side::Inside);
        assert_eq!(combined.side_of(50.0, 50.0), Side::Outside);
    }

    #[test]
    fn side_of_square() {
        let square = square_geometry(0, 0, 100);
        assert_eq!(square.side_of(50.0, 50.0), Side::Inside);
        assert_eq!(square.side_of(150.0, 50.0), Side::Outside);
        assert_eq!(square.side_of(100.0, 50.0), Side::Boundary);
        assert_eq!(square.side_of(-50.0, 50.0), Side::Outside);
    }

    #[test]
    fn segment_inside_square() {
        let square = square_geometry(0, 0, 100);
        // Fully interior.
        assert!(square.segment_inside((10, 10), (90, 90)));
        // Endpoint on the boundary is still inside.
        assert!(square.segment_inside((10, 10), (100, 50)));
        // Leaves the region.
        assert!(!square.segment_inside((50, 50), (150, 50)));
        // Fully outside.
        assert!(!square.segment_inside((200, 200), (300, 300)));
        // Degenerate segment classifies by the point.
        assert!(square.segment_inside((50, 50), (50, 50)));
    }

    #[test]
    fn segment_across_notch_crosses() {
        // L-shape: the chord between the two arm tips leaves the region.
        let ell = Geometry::new(vec![ipath(&[
            [0, 0],
            [100, 0],
            [100, 40],
            [40, 40],
            [40, 100],
            [0, 100],
        ])]);
        assert!(!ell.segment_inside((90, 20), (20, 90)));
        assert!(ell.segment_inside((10, 10), (90, 10)));
    }

    #[test]
    fn segment_inside_annulus_respects_hole() {
        let outer = square_geometry(0, 0, 100);
        let hole = square_geometry(40, 40, 20);
        let ring = outer.union(&hole).expect("union");
        assert!(!ring.segment_inside((10, 50), (90, 50)));
        assert!(ring.segment_inside((10, 10), (90, 10)));
    }

    #[test]
    fn empty_geometry_contains_nothing() {
        let empty = Geometry::empty();
        assert_eq!(empty.side_of(0.0, 0.0), Side::Outside);
        assert!(!empty.segment_inside((0, 0), (1, 1)));
    }
}
