//! Tone adjustments built from lookup tables and per-pixel color math.
//!
//! Each adjustment is a plain parameter value with a pure builder that
//! turns it into an immutable table. Building happens on the calling
//! thread before any worker starts, so workers only ever read tables.

pub mod brightness_contrast;
pub mod color_balance;
pub mod color_curve;
pub mod color_matrix;
pub mod hsl;
pub mod levels;
pub mod red_eye;
pub mod tint;

pub use brightness_contrast::{BrightnessContrast, apply_brightness_contrast};
pub use color_balance::{ColorBalance, apply_color_balance};
pub use color_curve::{ColorCurve, CurveAdjustment, CurveChannel, apply_color_curve};
pub use color_matrix::{ColorMatrix, apply_color_matrix};
pub use hsl::{HueSaturationLightness, apply_hue_saturation_lightness};
pub use levels::{Levels, apply_levels};
pub use red_eye::{RedEyeCorrection, apply_red_eye_reduction};
pub use tint::{Tint, TintTable, apply_tint};

/// Round `num / den` to the nearest integer, halves away from zero.
#[inline]
pub(crate) fn div_round(num: i32, den: i32) -> i32 {
    debug_assert!(den > 0);
    if num >= 0 {
        (num + den / 2) / den
    } else {
        (num - den / 2) / den
    }
}

#[inline]
pub(crate) fn clamp_byte(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}
