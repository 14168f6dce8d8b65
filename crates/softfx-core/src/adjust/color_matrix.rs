//! 5x5 affine color transform.
//!
//! Pixels are treated as row vectors `[R, G, B, A, 1]` multiplied on the
//! left of the matrix: output channel `j` is `sum(in[i] * m[i][j])` over
//! the four channels, plus `m[4][j] * 255`. The translation row is in
//! normalized units, so 1.0 adds full intensity. Column 4 is ignored.

use serde::{Deserialize, Serialize};

use crate::error::{FxError, Result};
use crate::image::{Bgra, PixelBufferMut, Rect};
use crate::processor::{PixelKernel, PixelKernelProcessor};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorMatrix {
    pub m: [[f32; 5]; 5],
}

impl ColorMatrix {
    pub const IDENTITY: ColorMatrix = ColorMatrix {
        m: [
            [1.0, 0.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 0.0, 1.0],
        ],
    };

    pub const fn new(m: [[f32; 5]; 5]) -> Self {
        Self { m }
    }

    /// Per-channel gains, R G B A.
    pub fn scale(r: f32, g: f32, b: f32, a: f32) -> Self {
        let mut out = Self::IDENTITY;
        for (i, gain) in [r, g, b, a].into_iter().enumerate() {
            out.m[i][i] = gain;
        }
        out
    }

    /// Replace color with Rec. 601 luminance; alpha passes through.
    pub fn grayscale() -> Self {
        let mut out = Self::IDENTITY;
        for (i, weight) in [0.299, 0.587, 0.114].into_iter().enumerate() {
            out.m[i][..3].fill(weight);
        }
        out
    }

    /// Matrix equal to applying `self` and then `next`.
    pub fn then(&self, next: &ColorMatrix) -> ColorMatrix {
        let mut out = [[0.0f32; 5]; 5];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = (0..5).map(|k| self.m[i][k] * next.m[k][j]).sum();
            }
        }
        ColorMatrix { m: out }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    pub fn validate(&self) -> Result<()> {
        if self.m.iter().flatten().any(|v| !v.is_finite()) {
            return Err(FxError::invalid("color matrix entries must be finite"));
        }
        Ok(())
    }
}

impl Default for ColorMatrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl PixelKernel for ColorMatrix {
    #[inline]
    fn pixel(&self, px: Bgra) -> Bgra {
        let input = [px.r as f32, px.g as f32, px.b as f32, px.a as f32];
        let channel = |j: usize| {
            let sum: f32 = input.iter().zip(&self.m).map(|(v, row)| v * row[j]).sum();
            (sum + self.m[4][j] * 255.0).round().clamp(0.0, 255.0) as u8
        };
        Bgra::from_rgba(channel(0), channel(1), channel(2), channel(3))
    }
}

pub fn apply_color_matrix(
    buffer: &mut PixelBufferMut<'_>,
    region: Rect,
    matrix: &ColorMatrix,
    max_threads: usize,
) -> Result<()> {
    matrix.validate()?;
    if matrix.is_identity() {
        PixelKernelProcessor::validate(buffer, &[], region)?;
        return Ok(());
    }
    tracing::debug!("color matrix {:?}", matrix.m);
    PixelKernelProcessor::new(max_threads).for_each_pixel(buffer, region, matrix)
}
