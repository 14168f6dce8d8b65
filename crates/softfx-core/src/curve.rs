//! Quadratic Bezier tone curves baked to 256-entry tables.
//!
//! A [`ToneCurve`] is a chain of quadratic Bezier segments sharing end
//! points: control points `P0 P1 P2` form the first segment, `P2 P3 P4` the
//! second, and so on. Coordinates are normalized, input on x and output on
//! y, both in `0..=1`.
//!
//! # Algorithm
//! The chain is sampled at [`CURVE_SAMPLES`] evenly spaced parameter values.
//! A table entry for input `v` is found by locating the two samples whose x
//! brackets `v / 255` and interpolating linearly between them. Inputs left
//! of the first sample or right of the last take that sample's y. Sample x
//! values are assumed to be non-decreasing.

use crate::error::{FxError, Result};

/// Parametric samples taken along a curve.
pub const CURVE_SAMPLES: usize = 256;

/// Chain of quadratic Bezier segments.
#[derive(Debug, Clone, PartialEq)]
pub struct ToneCurve {
    points: Vec<[f32; 2]>,
}

impl ToneCurve {
    /// Build from an odd number (at least three) of control points.
    pub fn new(points: Vec<[f32; 2]>) -> Result<Self> {
        if points.len() < 3 || points.len() % 2 == 0 {
            return Err(FxError::invalid(format!(
                "a quadratic curve chain needs an odd number of at least 3 points, got {}",
                points.len()
            )));
        }
        if points.iter().flatten().any(|c| !c.is_finite()) {
            return Err(FxError::invalid("curve control points must be finite"));
        }
        Ok(Self { points })
    }

    /// Straight line from `from` to `to`, as a single segment.
    pub fn line(from: [f32; 2], to: [f32; 2]) -> Self {
        Self {
            points: vec![from, midpoint(from, to), to],
        }
    }

    pub fn points(&self) -> &[[f32; 2]] {
        &self.points
    }

    pub fn segments(&self) -> usize {
        (self.points.len() - 1) / 2
    }

    /// Point on the chain at parameter `t` in `0..=1`.
    pub fn point_at(&self, t: f32) -> [f32; 2] {
        let segments = self.segments();
        let scaled = t.clamp(0.0, 1.0) * segments as f32;
        let seg = (scaled.floor() as usize).min(segments - 1);
        let u = scaled - seg as f32;
        let p0 = self.points[seg * 2];
        let p1 = self.points[seg * 2 + 1];
        let p2 = self.points[seg * 2 + 2];
        [
            quadratic(p0[0], p1[0], p2[0], u),
            quadratic(p0[1], p1[1], p2[1], u),
        ]
    }

    /// Evenly spaced parametric samples along the chain.
    pub fn samples(&self) -> Vec<[f32; 2]> {
        (0..CURVE_SAMPLES)
            .map(|i| self.point_at(i as f32 / (CURVE_SAMPLES - 1) as f32))
            .collect()
    }

    /// Bake into a byte table: entry `v` holds the curve's output for input
    /// `v / 255`, scaled back to `0..=255`.
    pub fn to_table(&self) -> [u8; 256] {
        let samples = self.samples();
        let evaluator = CurveEvaluator {
            samples: &samples,
        };
        let mut table = [0u8; 256];
        for (v, out) in table.iter_mut().enumerate() {
            let y = evaluator.evaluate(v as f32 / 255.0);
            *out = (y * 255.0).round().clamp(0.0, 255.0) as u8;
        }
        table
    }
}

/// Linear interpolation over sampled curve points.
///
/// Samples are `[x, y]` pairs sorted by x. Borrowed so that one sample set
/// can serve all 256 table entries.
pub struct CurveEvaluator<'a> {
    pub samples: &'a [[f32; 2]],
}

impl CurveEvaluator<'_> {
    /// Output at input `x`. Clamps to the first/last sample outside the
    /// sampled range; identity with no samples.
    pub fn evaluate(&self, x: f32) -> f32 {
        let pts = self.samples;
        if pts.is_empty() {
            return x;
        }
        if x <= pts[0][0] {
            return pts[0][1];
        }
        if x >= pts[pts.len() - 1][0] {
            return pts[pts.len() - 1][1];
        }

        // Binary search for the bracketing pair
        let mut lo = 0;
        let mut hi = pts.len() - 1;
        while hi - lo > 1 {
            let mid = (lo + hi) / 2;
            if pts[mid][0] <= x {
                lo = mid;
            } else {
                hi = mid;
            }
        }

        let (a, b) = (pts[lo], pts[hi]);
        let span = b[0] - a[0];
        if span.abs() < 1e-10 {
            return b[1];
        }
        a[1] + (x - a[0]) * (b[1] - a[1]) / span
    }
}

#[inline]
fn quadratic(p0: f32, p1: f32, p2: f32, u: f32) -> f32 {
    let inv = 1.0 - u;
    inv * inv * p0 + 2.0 * inv * u * p1 + u * u * p2
}

pub(crate) fn midpoint(a: [f32; 2], b: [f32; 2]) -> [f32; 2] {
    [(a[0] + b[0]) * 0.5, (a[1] + b[1]) * 0.5]
}
