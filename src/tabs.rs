use thiserror::Error;

use crate::geom::{Geometry, Side};
use crate::merge::CamPoint;

/// A contiguous run of a cutter path, either at full depth or held up over
/// a tab. Consecutive segments share their boundary point so the emitter's
/// plunge/retract happens exactly at the tab edge.
#[derive(Clone, Debug)]
pub struct TabSegment {
    pub points: Vec<CamPoint>,
    pub over_tab: bool,
}

impl TabSegment {
    pub fn whole(points: &[CamPoint]) -> Self {
        Self {
            points: points.to_vec(),
            over_tab: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum SeparateError {
    #[error("tab separation failed: {0}")]
    Internal(String),
}

/// Capability seam for tab separation. The emitter falls back to the
/// unmodified full-depth path when an implementation fails, so alternate
/// (e.g. native) implementations may error freely.
pub trait Separator {
    fn separate(
        &self,
        path: &[CamPoint],
        tabs: &Geometry,
    ) -> Result<Vec<TabSegment>, SeparateError>;
}

/// Pure implementation: splits each path edge at tab boundary crossings and
/// classifies every piece by its midpoint. A piece touching the boundary
/// counts as over-tab, leaving the tab intact.
#[derive(Clone, Copy, Debug, Default)]
pub struct SegmentSeparator;

impl Separator for SegmentSeparator {
    fn separate(
        &self,
        path: &[CamPoint],
        tabs: &Geometry,
    ) -> Result<Vec<TabSegment>, SeparateError> {
        if tabs.is_empty() || path.len() < 2 {
            return Ok(vec![TabSegment::whole(path)]);
        }

        let mut segments: Vec<TabSegment> = Vec::new();
        let mut cur: Vec<CamPoint> = vec![path[0]];
        let mut cur_over: Option<bool> = None;

        for win in path.windows(2) {
            let (a, b) = (win[0], win[1]);
            let af = (a.x as f64, a.y as f64);
            let bf = (b.x as f64, b.y as f64);

            let mut ts = tabs.crossing_params(af, bf);
            ts.insert(0, 0.0);
            ts.push(1.0);

            for w in ts.windows(2) {
                let (t0, t1) = (w[0], w[1]);
                if t1 - t0 < 1e-9 {
                    continue;
                }
                let tm = (t0 + t1) / 2.0;
                let over = tabs.side_of(af.0 + tm * (bf.0 - af.0), af.1 + tm * (bf.1 - af.1))
                    != Side::Outside;

                let end_point = if t1 >= 1.0 {
                    b
                } else {
                    CamPoint {
                        x: (af.0 + t1 * (bf.0 - af.0)).round() as i64,
                        y: (af.1 + t1 * (bf.1 - af.1)).round() as i64,
                        z: a.z + ((b.z - a.z) as f64 * t1).round() as i64,
                    }
                };

                match cur_over {
                    None => cur_over = Some(over),
                    Some(flag) if flag != over => {
                        let shared = cur[cur.len() - 1];
                        segments.push(TabSegment {
                            points: std::mem::replace(&mut cur, vec![shared]),
                            over_tab: flag,
                        });
                        cur_over = Some(over);
                    }
                    _ => {}
                }
                if end_point != cur[cur.len() - 1] {
                    cur.push(end_point);
                }
            }
        }

        if cur.len() > 1 {
            segments.push(TabSegment {
                points: cur,
                over_tab: cur_over.unwrap_or(false),
            });
        }
        if segments.is_empty() {
            return Ok(vec![TabSegment::whole(path)]);
        }
        Ok(segments)
    }
}
