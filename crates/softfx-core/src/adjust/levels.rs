//! Input levels: remap a shadow..highlight input range onto the full
//! output range with an adjustable midtone.

use serde::{Deserialize, Serialize};

use crate::curve::ToneCurve;
use crate::error::{FxError, Result, check_range};
use crate::image::{PixelBufferMut, Rect};
use crate::lut::{ChannelLuts, Lut, apply_channel_luts};

/// Highlight and shadow are percentages of the input range (`0..=100`);
/// midtone in `-100..=100` lightens (positive) or darkens the middle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Levels {
    pub highlight: i32,
    pub midtone: i32,
    pub shadow: i32,
}

impl Default for Levels {
    fn default() -> Self {
        Self {
            highlight: 100,
            midtone: 0,
            shadow: 0,
        }
    }
}

impl Levels {
    pub fn validate(&self) -> Result<()> {
        check_range("highlight", self.highlight, 0, 100)?;
        check_range("midtone", self.midtone, -100, 100)?;
        check_range("shadow", self.shadow, 0, 100)?;
        if self.shadow >= self.highlight {
            return Err(FxError::invalid(format!(
                "shadow {} must be below highlight {}",
                self.shadow, self.highlight
            )));
        }
        Ok(())
    }

    /// Five control points: the input range ends, the bent center and the
    /// two quarter points that keep the bend smooth.
    pub fn curve(&self) -> Result<ToneCurve> {
        self.validate()?;
        let lo = self.shadow as f32 / 100.0;
        let hi = self.highlight as f32 / 100.0;
        let center = (lo + hi) * 0.5;
        let bend = self.midtone as f32 / 100.0 * 0.25;
        ToneCurve::new(vec![
            [lo, 0.0],
            [(lo + center) * 0.5, 0.25 + bend],
            [center, 0.5 + bend],
            [(center + hi) * 0.5, 0.75 + bend],
            [hi, 1.0],
        ])
    }

    pub fn lut(&self) -> Result<Lut> {
        Ok(Lut::from_table(self.curve()?.to_table()))
    }

    pub fn luts(&self) -> Result<ChannelLuts> {
        Ok(ChannelLuts::color(self.lut()?))
    }
}

pub fn apply_levels(
    buffer: &mut PixelBufferMut<'_>,
    region: Rect,
    params: &Levels,
    max_threads: usize,
) -> Result<()> {
    let luts = params.luts()?;
    tracing::debug!(
        "levels shadow {} midtone {} highlight {}",
        params.shadow,
        params.midtone,
        params.highlight
    );
    apply_channel_luts(buffer, region, &luts, max_threads)
}
