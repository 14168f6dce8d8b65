//! SoftFX Core: CPU pixel effects engine.
//!
//! Separable blur and sharpen, plus a family of lookup-table, HSL and
//! color-matrix tone adjustments, all run over borrowed 32-bit BGRA buffers
//! with rows split across a per-call worker pool. Output is bit-identical
//! for every thread count.

pub mod adjust;
pub mod color;
pub mod config;
pub mod convolve;
pub mod curve;
pub mod effect;
pub mod error;
pub mod image;
pub mod lut;
pub mod memo;
pub mod processor;

// Re-exports for convenience.
pub use crate::adjust::{
    BrightnessContrast, ColorBalance, ColorCurve, ColorMatrix, CurveAdjustment, CurveChannel,
    HueSaturationLightness, Levels, RedEyeCorrection, Tint, apply_brightness_contrast,
    apply_color_balance, apply_color_curve, apply_color_matrix, apply_hue_saturation_lightness,
    apply_levels, apply_red_eye_reduction, apply_tint,
};
pub use crate::config::EngineConfig;
pub use crate::convolve::{apply_blur, apply_sharpen};
pub use crate::effect::{Effect, EffectProcessor};
pub use crate::error::{FxError, Result};
pub use crate::image::{Bgra, Bitmap, PixelBuffer, PixelBufferMut, PixelFormat, Rect};
pub use crate::lut::{ChannelLuts, HslLuts, Lut, apply_hsl_lookup_tables, apply_lookup_tables};
pub use crate::processor::{PixelKernel, PixelKernelProcessor};
