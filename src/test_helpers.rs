use crate::geom::{Geometry, IntPath, IntPoint, ENGINE_UNITS_PER_INCH};
use crate::merge::{CamPath, CamPoint};

pub fn p(x: i64, y: i64) -> IntPoint {
    IntPoint::from_scaled(x, y)
}

pub fn ipath(coords: &[[i64; 2]]) -> IntPath {
    IntPath::new(coords.iter().map(|c| p(c[0], c[1])).collect())
}

pub fn square_geometry(x0: i64, y0: i64, side: i64) -> Geometry {
    Geometry::new(vec![ipath(&[
        [x0, y0],
        [x0 + side, y0],
        [x0 + side, y0 + side],
        [x0, y0 + side],
    ])])
}

pub fn inch(v: f64) -> f64 {
    v * ENGINE_UNITS_PER_INCH
}

/// Twice the signed area. Sign flips with winding direction.
pub fn shoelace(points: &[CamPoint]) -> i128 {
    let mut sum = 0i128;
    for w in points.windows(2) {
        sum += w[0].x as i128 * w[1].y as i128 - w[1].x as i128 * w[0].y as i128;
    }
    sum
}

/// Builds a closed path (first point repeated at the end) from corner
/// coordinates.
pub fn closed_cam_path(coords: &[[i64; 2]], safe_to_close: bool) -> CamPath {
    let mut points: Vec<CamPoint> = coords.iter().map(|c| CamPoint::new(c[0], c[1])).collect();
    if let Some(&first) = points.first() {
        points.push(first);
    }
    CamPath {
        points,
        safe_to_close,
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Waypoint {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub f: Option<f64>,
}

/// Minimal reader for generated output: collects the words of every G0/G1
/// line, ignoring comments.
pub fn parse_gcode_moves(gcode: &str) -> Vec<Waypoint> {
    let mut moves = Vec::new();
    for line in gcode.lines() {
        let code = line.split(';').next().unwrap_or("").trim();
        if code.is_empty() {
            continue;
        }
        let mut words = code.split_whitespace();
        match words.next() {
            Some("G0") | Some("G1") => {}
            _ => continue,
        }
        let mut wp = Waypoint::default();
        for word in words {
            let (letter, value) = word.split_at(1);
            let value: f64 = match value.parse() {
                Ok(v) => v,
                Err(_) => continue,
            };
            match letter {
                "X" => wp.x = Some(value),
                "Y" => wp.y = Some(value),
                "Z" => wp.z = Some(value),
                "F" => wp.f = Some(value),
                _ => {}
            }
        }
        moves.push(wp);
    }
    moves
}
