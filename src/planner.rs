use clipper2::ClipperError;
use tracing::debug;

use crate::desc::CombineOp;
use crate::geom::{Geometry, IntPath, IntPoint};
use crate::merge::{merge_paths, CamPath};

fn reversed(path: &IntPath) -> IntPath {
    let mut pts: Vec<IntPoint> = path.iter().cloned().collect();
    pts.reverse();
    IntPath::new(pts)
}

// Winding is flipped on the copies only; the iterated offset always sees the
// orientation clipper2 produced.
fn take_loops(geometry: &Geometry, reverse: bool) -> Vec<IntPath> {
    geometry
        .iter()
        .map(|p| if reverse { reversed(p) } else { p.clone() })
        .collect()
}

fn prepend(loops: Vec<IntPath>, mut accumulator: Vec<IntPath>) -> Vec<IntPath> {
    let mut loops = loops;
    loops.append(&mut accumulator);
    loops
}

/// Applies the operation's combine rule across its geometry sets, left to
/// right. Empty input yields empty geometry.
pub fn combine(geometries: &[Geometry], op: CombineOp) -> Result<Geometry, ClipperError> {
    let mut iter = geometries.iter();
    let Some(first) = iter.next() else {
        return Ok(Geometry::empty());
    };
    let mut combined = first.clone();
    for g in iter {
        combined = match op {
            CombineOp::Union => combined.union(g)?,
            CombineOp::Intersect => combined.intersect(g)?,
            CombineOp::Diff => combined.difference(g)?,
            CombineOp::Xor => combined.xor(g)?,
        };
    }
    Ok(combined)
}

/// Clears all material inside `geometry`. Loops are accumulated innermost
/// first so the pocket is hollowed from the center toward the boundary;
/// `overlap` is the fraction of the cutter overlapping between passes.
pub fn pocket(geometry: &Geometry, cutter_dia: f64, overlap: f64, climb: bool) -> Vec<CamPath> {
    let mut current = geometry.offset(-cutter_dia / 2.0);
    let bounds = current.clone();
    let step = -cutter_dia * (1.0 - overlap);

    let mut all_loops: Vec<IntPath> = Vec::new();
    let mut passes = 0usize;
    while !current.is_empty() {
        passes += 1;
        all_loops = prepend(take_loops(&current, climb), all_loops);
        current = current.offset(step);
    }
    debug!(passes, loops = all_loops.len(), "pocket offsets done");

    merge_paths(Some(&bounds), &all_loops)
}

/// Follows the boundary at the given total `width`, on the inner or outer
/// side. The permitted travel region is the annulus actually being cleared.
pub fn outline(
    geometry: &Geometry,
    cutter_dia: f64,
    is_inside: bool,
    width: f64,
    overlap: f64,
    climb: bool,
) -> Result<Vec<CamPath>, ClipperError> {
    let each_width = cutter_dia * (1.0 - overlap);

    let (mut current, bounds, sign, need_reverse) = if is_inside {
        let current = geometry.offset(-cutter_dia / 2.0);
        let bounds = current.difference(&geometry.offset(-(width - cutter_dia / 2.0)))?;
        (current, bounds, -1.0, climb)
    } else {
        let current = geometry.offset(cutter_dia / 2.0);
        let bounds = geometry
            .offset(width - cutter_dia / 2.0)
            .difference(&current)?;
        (current, bounds, 1.0, !climb)
    };

    let mut all_loops: Vec<IntPath> = Vec::new();
    let mut current_width = cutter_dia;
    while current_width <= width && !current.is_empty() {
        all_loops = prepend(take_loops(&current, need_reverse), all_loops);

        let next_width = current_width + each_width;
        if next_width > width && width - current_width > 0.0 {
            // Partial last step lands exactly on the requested width.
            current = current.offset(sign * (width - current_width));
            all_loops = prepend(take_loops(&current, need_reverse), all_loops);
            break;
        }
        current_width = next_width;
        current = current.offset(sign * each_width);
    }
    debug!(loops = all_loops.len(), is_inside, "outline offsets done");

    Ok(merge_paths(Some(&bounds), &all_loops))
}

/// Traces each input loop as its own path, reversed for conventional
/// milling. Merging with no bounds keeps every loop separate.
pub fn engrave(geometry: &Geometry, climb: bool) -> Vec<CamPath> {
    let loops = take_loops(geometry, !climb);
    let mut result = merge_paths(None, &loops);
    // Closing an engrave path is always treated as safe.
    for path in &mut result {
        path.safe_to_close = true;
    }
    result
}
