use serde::Deserialize;
use std::fmt;
use thiserror::Error;

use crate::geom::{self, Geometry, IntPath, IntPoint};

// Flat [x0, y0, x1, y1, ...] vertex list, one closed loop, in the section's
// declared units.
pub type FlatVerts = Vec<f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    Inch,
    Mm,
}

impl Units {
    pub fn engine_scale(self) -> f64 {
        match self {
            Units::Inch => geom::ENGINE_UNITS_PER_INCH,
            Units::Mm => geom::ENGINE_UNITS_PER_MM,
        }
    }

    pub fn to_engine(self, v: f64) -> f64 {
        v * self.engine_scale()
    }

    /// Conversion factor from `self` units into `other` units.
    pub fn factor_to(self, other: Units) -> f64 {
        self.engine_scale() / other.engine_scale()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Direction {
    Conventional,
    Climb,
}

impl Direction {
    pub fn is_climb(self) -> bool {
        self == Direction::Climb
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Conventional => "Conventional",
            Direction::Climb => "Climb",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum CombineOp {
    #[default]
    Union,
    Intersect,
    Diff,
    Xor,
}

/// Cut strategy. Deserialized through `CamOpRaw` so the legacy `"Outline"`
/// spelling normalizes to `Outside` once, at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "CamOpRaw")]
pub enum CamOp {
    Pocket,
    Inside,
    Outside,
    Engrave,
}

#[derive(Debug, Clone, Copy, Deserialize)]
enum CamOpRaw {
    Pocket,
    Inside,
    Outside,
    Outline,
    Engrave,
}

impl From<CamOpRaw> for CamOp {
    fn from(raw: CamOpRaw) -> Self {
        match raw {
            CamOpRaw::Pocket => CamOp::Pocket,
            CamOpRaw::Inside => CamOp::Inside,
            CamOpRaw::Outside | CamOpRaw::Outline => CamOp::Outside,
            CamOpRaw::Engrave => CamOp::Engrave,
        }
    }
}

impl fmt::Display for CamOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CamOp::Pocket => "Pocket",
            CamOp::Inside => "Inside",
            CamOp::Outside => "Outside",
            CamOp::Engrave => "Engrave",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ZOrigin {
    Top,
    Bottom,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MaterialDesc {
    pub units: Units,
    pub thickness: f64,
    pub z_origin: ZOrigin,
    pub clearance: f64,
}

impl MaterialDesc {
    /// Z of the material top surface, in material units.
    pub fn top_z(&self) -> f64 {
        match self.z_origin {
            ZOrigin::Top => 0.0,
            ZOrigin::Bottom => self.thickness,
        }
    }

    pub fn safe_z(&self) -> f64 {
        self.top_z() + self.clearance
    }
}

/// Tool parameters. Deserialized through `ToolDescRaw`: the legacy `overlap`
/// field is the complement of stepover and normalizes here.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "ToolDescRaw")]
pub struct ToolDesc {
    pub units: Units,
    pub diameter: f64,
    pub pass_depth: f64,
    pub stepover: f64,
    pub rapid_rate: f64,
    pub plunge_rate: f64,
    pub cut_rate: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct ToolDescRaw {
    units: Units,
    diameter: f64,
    pass_depth: f64,
    #[serde(default)]
    stepover: Option<f64>,
    #[serde(default)]
    overlap: Option<f64>,
    rapid_rate: f64,
    plunge_rate: f64,
    cut_rate: f64,
}

impl From<ToolDescRaw> for ToolDesc {
    fn from(raw: ToolDescRaw) -> Self {
        let stepover = raw
            .stepover
            .or(raw.overlap.map(|o| 1.0 - o))
            .unwrap_or(0.4);
        Self {
            units: raw.units,
            diameter: raw.diameter,
            pass_depth: raw.pass_depth,
            stepover,
            rapid_rate: raw.rapid_rate,
            plunge_rate: raw.plunge_rate,
            cut_rate: raw.cut_rate,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TabsDesc {
    pub units: Units,
    pub max_cut_depth: f64,
    #[serde(default)]
    pub polygons: Vec<FlatVerts>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GcodeDesc {
    pub units: Units,
    #[serde(default)]
    pub x_offset: f64,
    #[serde(default)]
    pub y_offset: f64,
    #[serde(default = "default_decimals")]
    pub decimals: usize,
    #[serde(default)]
    pub return_to_origin: bool,
}

fn default_decimals() -> usize {
    4
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationDesc {
    #[serde(default)]
    pub name: String,
    pub cam_op: CamOp,
    pub units: Units,
    #[serde(default = "default_direction")]
    pub direction: Direction,
    #[serde(default)]
    pub tool: usize,
    pub cut_depth: f64,
    #[serde(default)]
    pub margin: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub combine_op: CombineOp,
    #[serde(default = "default_true")]
    pub ramp: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub geometry: Vec<FlatVerts>,
}

fn default_direction() -> Direction {
    Direction::Conventional
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobDesc {
    #[serde(default = "default_version")]
    pub version: u32,
    pub material: MaterialDesc,
    pub tools: Vec<ToolDesc>,
    #[serde(default)]
    pub tabs: Option<TabsDesc>,
    pub gcode: GcodeDesc,
    pub operations: Vec<OperationDesc>,
}

fn default_version() -> u32 {
    1
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("tool {tool}: diameter must be positive, got {value}")]
    ToolDiameter { tool: usize, value: f64 },
    #[error("tool {tool}: stepover must be within (0, 1), got {value}")]
    ToolStepover { tool: usize, value: f64 },
    #[error("tool {tool}: pass depth must be positive, got {value}")]
    ToolPassDepth { tool: usize, value: f64 },
    #[error("operation {op} ({name:?}): cut depth must be positive, got {value}")]
    OpCutDepth { op: usize, name: String, value: f64 },
    #[error("operation {op} ({name:?}): tool index {tool} out of range")]
    OpToolIndex { op: usize, name: String, tool: usize },
}

impl JobDesc {
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (i, tool) in self.tools.iter().enumerate() {
            if tool.diameter <= 0.0 {
                return Err(ValidationError::ToolDiameter {
                    tool: i,
                    value: tool.diameter,
                });
            }
            if tool.stepover <= 0.0 || tool.stepover >= 1.0 {
                return Err(ValidationError::ToolStepover {
                    tool: i,
                    value: tool.stepover,
                });
            }
            if tool.pass_depth <= 0.0 {
                return Err(ValidationError::ToolPassDepth {
                    tool: i,
                    value: tool.pass_depth,
                });
            }
        }
        for (i, op) in self.operations.iter().enumerate() {
            if !op.enabled {
                continue;
            }
            if op.tool >= self.tools.len() {
                return Err(ValidationError::OpToolIndex {
                    op: i,
                    name: op.name.clone(),
                    tool: op.tool,
                });
            }
            if op.cut_depth <= 0.0 {
                return Err(ValidationError::OpCutDepth {
                    op: i,
                    name: op.name.clone(),
                    value: op.cut_depth,
                });
            }
        }
        Ok(())
    }
}

pub fn parse_job_json(json_text: &str) -> Result<JobDesc, serde_json::Error> {
    serde_json::from_str(json_text)
}

/// Converts one flat vertex list into an integer loop. Fewer than 3 points
/// yields nothing; a trailing odd coordinate is dropped.
pub fn flat_verts_to_path(flat: &[f64], units: Units) -> Option<IntPath> {
    let n = flat.len() - flat.len() % 2;
    if n < 6 {
        return None;
    }

    let scale = units.engine_scale();
    let pts: Vec<IntPoint> = flat[..n]
        .chunks_exact(2)
        .map(|xy| {
            IntPoint::from_scaled(
                (xy[0] * scale).round() as i64,
                (xy[1] * scale).round() as i64,
            )
        })
        .collect();
    Some(IntPath::new(pts))
}

pub fn polys_to_geometry(polys: &[FlatVerts], units: Units) -> Geometry {
    Geometry::new(
        polys
            .iter()
            .filter_map(|poly| flat_verts_to_path(poly, units))
            .collect(),
    )
}
