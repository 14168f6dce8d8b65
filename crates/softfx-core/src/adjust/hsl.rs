//! Hue, saturation and lightness shifts through HSL lookup tables.

use serde::{Deserialize, Serialize};

use crate::color::hue_degrees_to_steps;
use crate::error::{Result, check_range};
use crate::image::{PixelBufferMut, Rect};
use crate::lut::{HslLuts, Lut, apply_hsl_luts};

use super::div_round;

/// Hue rotation in degrees (rolled into one turn, so 360 equals 0),
/// saturation and lightness in `-100..=100`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HueSaturationLightness {
    pub hue: i32,
    pub saturation: i32,
    pub lightness: i32,
}

impl HueSaturationLightness {
    pub fn validate(&self) -> Result<()> {
        check_range("saturation", self.saturation, -100, 100)?;
        check_range("lightness", self.lightness, -100, 100)
    }

    pub fn luts(&self) -> Result<HslLuts> {
        self.validate()?;
        Ok(HslLuts {
            h: hue_shift_lut(self.hue),
            s: saturation_lut(self.saturation),
            l: lightness_lut(self.lightness),
            a: Lut::IDENTITY,
        })
    }
}

/// Rotate the byte hue by `degrees`, wrapping around the circle.
pub fn hue_shift_lut(degrees: i32) -> Lut {
    let shift = hue_degrees_to_steps(degrees.rem_euclid(360) as f32);
    Lut::from_fn(|h| h.wrapping_add(shift))
}

/// Scale saturation by `(100 + amount) / 100`. Gray stays gray.
pub fn saturation_lut(amount: i32) -> Lut {
    Lut::from_fn(|s| {
        let scaled = div_round(s as i32 * (100 + amount), 100);
        scaled.clamp(0, 255) as u8
    })
}

/// Move lightness toward white (positive) or black (negative) by
/// `amount` percent of the remaining distance.
pub fn lightness_lut(amount: i32) -> Lut {
    Lut::from_fn(|l| {
        let l = l as i32;
        let out = if amount >= 0 {
            l + div_round((255 - l) * amount, 100)
        } else {
            div_round(l * (100 + amount), 100)
        };
        out.clamp(0, 255) as u8
    })
}

pub fn apply_hue_saturation_lightness(
    buffer: &mut PixelBufferMut<'_>,
    region: Rect,
    params: &HueSaturationLightness,
    max_threads: usize,
) -> Result<()> {
    let luts = params.luts()?;
    tracing::debug!(
        "hsl shift hue {} saturation {} lightness {}",
        params.hue,
        params.saturation,
        params.lightness
    );
    apply_hsl_luts(buffer, region, &luts, max_threads)
}
