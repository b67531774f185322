use thiserror::Error;
use tracing::warn;

use crate::desc::{polys_to_geometry, CamOp, JobDesc, Units, ValidationError};
use crate::geom::Geometry;
use crate::merge::{CamPath, CamPoint};
use crate::planner;
use crate::tabs::{SegmentSeparator, Separator, TabSegment};

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("geometry operation failed: {0}")]
    Geometry(#[from] clipper2::ClipperError),
}

/// Everything the per-path emitter needs. Z values, feeds and offsets are in
/// G-code output units; `scale` converts engine units into output units.
#[derive(Clone, Debug)]
pub struct GcodeParams {
    pub ramp: bool,
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    pub decimals: usize,
    pub top_z: f64,
    pub bot_z: f64,
    pub safe_z: f64,
    pub pass_depth: f64,
    pub plunge_feed: f64,
    pub retract_feed: f64,
    pub cut_feed: f64,
    pub rapid_feed: f64,
    pub use_z: bool,
    pub tab_geometry: Geometry,
    pub tab_z: f64,
}

fn xy_words(p: &CamPoint, params: &GcodeParams) -> String {
    let dec = params.decimals;
    format!(
        " X{:.dec$} Y{:.dec$}",
        p.x as f64 * params.scale + params.offset_x,
        -p.y as f64 * params.scale + params.offset_y,
    )
}

fn point_words(p: &CamPoint, params: &GcodeParams) -> String {
    let mut words = xy_words(p, params);
    if params.use_z {
        let dec = params.decimals;
        words.push_str(&format!(
            " Z{:.dec$}",
            p.z as f64 * params.scale + params.top_z
        ));
    }
    words
}

fn xy_dist(a: &CamPoint, b: &CamPoint, scale: f64) -> f64 {
    let dx = (b.x - a.x) as f64 * scale;
    let dy = (b.y - a.y) as f64 * scale;
    (dx * dx + dy * dy).sqrt()
}

/// Ramped plunge: descend along the segment's own leading points, forward
/// then mirrored back to the start, long enough that the plunge rate is
/// honored at cut feed. Returns false when there is no run-up to use.
fn emit_ramp(
    out: &mut String,
    points: &[CamPoint],
    current_z: f64,
    target_z: f64,
    params: &GcodeParams,
) -> bool {
    let dec = params.decimals;
    let min_plunge_time = (current_z - target_z) / params.plunge_feed;
    let ideal_dist = params.cut_feed * min_plunge_time;

    let mut end = 1;
    let mut total_dist = 0.0;
    while end < points.len() {
        if total_dist > ideal_dist {
            break;
        }
        total_dist += 2.0 * xy_dist(&points[end - 1], &points[end], params.scale);
        end += 1;
    }
    if total_dist <= 0.0 {
        return false;
    }

    out.push_str("; ramp\r\n");
    let ramp_path: Vec<&CamPoint> = points[..end]
        .iter()
        .chain(points[..end - 1].iter().rev())
        .collect();
    let mut travelled = 0.0;
    for i in 1..ramp_path.len() {
        travelled += xy_dist(ramp_path[i - 1], ramp_path[i], params.scale);
        let z = current_z + travelled / total_dist * (target_z - current_z);
        out.push_str("G1");
        out.push_str(&xy_words(ramp_path[i], params));
        out.push_str(&format!(" Z{z:.dec$}"));
        if i == 1 {
            let feed = (total_dist / min_plunge_time).min(params.cut_feed);
            out.push_str(&format!(" F{feed:.dec$}"));
        }
        out.push_str("\r\n");
    }
    true
}

/// Emits the motion instructions for a set of planned paths. Returns how
/// many paths fell back to full depth because tab separation failed.
pub fn emit_paths(
    out: &mut String,
    paths: &[CamPath],
    params: &GcodeParams,
    separator: &dyn Separator,
) -> usize {
    let dec = params.decimals;

    // Tabs shallower than the cut bottom never engage.
    let (tab_geometry, tab_z) = if params.tab_geometry.is_empty() || params.tab_z <= params.bot_z
    {
        (Geometry::empty(), params.bot_z)
    } else {
        (params.tab_geometry.clone(), params.tab_z)
    };
    let has_tabs = !tab_geometry.is_empty();
    let mut tab_failures = 0usize;

    let retract = format!(
        "; Retract\r\nG1 Z{:.dec$} F{:.dec$}\r\n",
        params.safe_z, params.retract_feed,
    );
    let tab_retract = format!(
        "; Retract for tab\r\nG1 Z{tab_z:.dec$} F{:.dec$}\r\n",
        params.retract_feed,
    );

    for (path_index, cam_path) in paths.iter().enumerate() {
        if cam_path.points.is_empty() {
            continue;
        }

        let whole = vec![TabSegment::whole(&cam_path.points)];
        let separated = if has_tabs {
            match separator.separate(&cam_path.points, &tab_geometry) {
                Ok(segments) => segments,
                Err(_) => {
                    tab_failures += 1;
                    whole.clone()
                }
            }
        } else {
            whole.clone()
        };

        out.push_str(&format!("\r\n; Path {path_index}\r\n"));

        let mut current_z = params.safe_z;
        let mut finished_z = params.top_z;
        while finished_z > params.bot_z {
            let next_z = (finished_z - params.pass_depth).max(params.bot_z);

            if current_z < params.safe_z && (!cam_path.safe_to_close || has_tabs) {
                out.push_str(&retract);
                current_z = params.safe_z;
            }
            if !params.use_z {
                // Descend to the floor of the previous pass (or the tab top);
                // the per-segment plunge covers the rest.
                current_z = finished_z.max(tab_z);
            }
            out.push_str("; Rapid to initial position\r\n");
            out.push_str(&format!("G0{}\r\n", xy_words(&cam_path.points[0], params)));
            out.push_str(&format!(
                "G1 Z{current_z:.dec$} F{:.dec$}\r\n",
                params.rapid_feed,
            ));

            let segments: &[TabSegment] = if params.use_z || next_z >= tab_z {
                &whole
            } else {
                &separated
            };

            for segment in segments {
                if segment.points.len() < 2 {
                    continue;
                }
                // Per-point-Z moves carry their own depth; plunging and tab
                // transitions apply only when Z is driven by the pass.
                if !params.use_z {
                    let segment_z = if segment.over_tab { tab_z } else { next_z };

                    if segment_z < current_z {
                        let mut ramped = false;
                        if params.ramp {
                            ramped =
                                emit_ramp(out, &segment.points, current_z, segment_z, params);
                        }
                        if !ramped {
                            out.push_str(&format!(
                                "; plunge\r\nG1 Z{segment_z:.dec$} F{:.dec$}\r\n",
                                params.plunge_feed,
                            ));
                        }
                    } else if segment_z > current_z {
                        out.push_str(&tab_retract);
                    }
                    current_z = segment_z;
                }

                out.push_str("; cut\r\n");
                for (i, point) in segment.points.iter().enumerate().skip(1) {
                    out.push_str("G1");
                    out.push_str(&point_words(point, params));
                    if i == 1 {
                        out.push_str(&format!(" F{:.dec$}", params.cut_feed));
                    }
                    out.push_str("\r\n");
                }
            }

            finished_z = next_z;
            if params.use_z {
                break;
            }
        }
        out.push_str(&retract);
    }

    tab_failures
}

/// Assembles one full G-code document for a job: header, one block per
/// enabled operation, optional return to origin, program end.
pub fn generate_document(job: &JobDesc) -> Result<String, JobError> {
    job.validate()?;

    let gunits = job.gcode.units;
    let gscale = 1.0 / gunits.engine_scale();
    let dec = job.gcode.decimals;

    let mat_to_g = job.material.units.factor_to(gunits);
    let top_z = job.material.top_z() * mat_to_g;
    let safe_z = job.material.safe_z() * mat_to_g;

    let (tab_polys, tab_z) = match &job.tabs {
        Some(tabs) if !tabs.polygons.is_empty() && tabs.max_cut_depth > 0.0 => {
            let geometry = polys_to_geometry(&tabs.polygons, tabs.units);
            let depth = tabs.max_cut_depth * tabs.units.factor_to(gunits);
            (geometry, top_z - depth)
        }
        _ => (Geometry::empty(), top_z),
    };

    let mut out = String::new();
    match gunits {
        Units::Inch => out.push_str("G20         ; Set units to inches\r\n"),
        Units::Mm => out.push_str("G21         ; Set units to mm\r\n"),
    }
    out.push_str("G90         ; Absolute positioning\r\n");
    if let Some(op) = job.operations.iter().find(|op| op.enabled) {
        let tool = &job.tools[op.tool];
        let rapid = tool.rapid_rate * tool.units.factor_to(gunits);
        out.push_str(&format!(
            "G1 Z{safe_z:.dec$} F{rapid:.dec$}      ; Move to clearance level\r\n"
        ));
    }

    let separator = SegmentSeparator;
    let mut tab_failures = 0usize;
    let mut op_index = 0usize;

    for op in &job.operations {
        if !op.enabled {
            continue;
        }
        let tool = &job.tools[op.tool];
        let tool_to_g = tool.units.factor_to(gunits);
        let op_to_g = op.units.factor_to(gunits);

        let cutter_dia = tool.units.to_engine(tool.diameter);
        let overlap = 1.0 - tool.stepover;
        let climb = op.direction.is_climb();

        // Combine the operation's polygons under its rule, then apply the
        // margin on the cut side.
        let geometries: Vec<Geometry> = op
            .geometry
            .iter()
            .map(|poly| polys_to_geometry(std::slice::from_ref(poly), op.units))
            .collect();
        let mut geometry = planner::combine(&geometries, op.combine_op)?;
        let margin = op.units.to_engine(op.margin);
        if margin != 0.0 {
            let delta = match op.cam_op {
                CamOp::Pocket | CamOp::Inside => -margin,
                CamOp::Outside => margin,
                CamOp::Engrave => 0.0,
            };
            if delta != 0.0 {
                geometry = geometry.offset(delta);
            }
        }

        let paths = match op.cam_op {
            CamOp::Pocket => planner::pocket(&geometry, cutter_dia, overlap, climb),
            CamOp::Inside | CamOp::Outside => {
                let width = op.units.to_engine(op.width).max(cutter_dia);
                planner::outline(
                    &geometry,
                    cutter_dia,
                    op.cam_op == CamOp::Inside,
                    width,
                    overlap,
                    climb,
                )?
            }
            CamOp::Engrave => planner::engrave(&geometry, climb),
        };

        let params = GcodeParams {
            ramp: op.ramp,
            scale: gscale,
            offset_x: job.gcode.x_offset,
            offset_y: job.gcode.y_offset,
            decimals: dec,
            top_z,
            bot_z: top_z - op.cut_depth * op_to_g,
            safe_z,
            pass_depth: tool.pass_depth * tool_to_g,
            plunge_feed: tool.plunge_rate * tool_to_g,
            retract_feed: tool.rapid_rate * tool_to_g,
            cut_feed: tool.cut_rate * tool_to_g,
            rapid_feed: tool.rapid_rate * tool_to_g,
            use_z: false,
            tab_geometry: if tab_polys.is_empty() {
                Geometry::empty()
            } else {
                tab_polys.offset(cutter_dia / 2.0)
            },
            tab_z,
        };

        // Each operation's block is assembled separately so a fault cannot
        // leave a half-written block in the document.
        let mut block = String::new();
        block.push_str(&format!(
            "\r\n;\r\n\
             ; Operation:    {op_index}\r\n\
             ; Name:         {}\r\n\
             ; Type:         {}\r\n\
             ; Paths:        {}\r\n\
             ; Direction:    {}\r\n\
             ; Cut Depth:    {:.dec$}\r\n\
             ; Pass Depth:   {:.dec$}\r\n\
             ; Plunge rate:  {:.dec$}\r\n\
             ; Cut rate:     {:.dec$}\r\n\
             ;\r\n",
            op.name,
            op.cam_op,
            paths.len(),
            op.direction,
            op.cut_depth * op_to_g,
            params.pass_depth,
            params.plunge_feed,
            params.cut_feed,
        ));
        tab_failures += emit_paths(&mut block, &paths, &params, &separator);
        out.push_str(&block);
        op_index += 1;
    }

    if tab_failures > 0 {
        warn!(
            failures = tab_failures,
            "tab separation failed; affected paths were cut at full depth"
        );
    }

    if job.gcode.return_to_origin {
        out.push_str("\r\n; Return to 0,0\r\nG0 X0 Y0\r\n");
    }
    out.push_str("\r\nM2          ; Program end\r\n");

    Ok(out)
}
