//! Serializable effect descriptions and a dispatcher that keeps the tables
//! and kernels built for the last parameters it saw.

use serde::{Deserialize, Serialize};

use crate::adjust::{
    BrightnessContrast, ColorBalance, ColorCurve, ColorMatrix, HueSaturationLightness, Levels,
    RedEyeCorrection, Tint, TintTable, apply_red_eye_reduction,
};
use crate::config::EngineConfig;
use crate::convolve::kernel::validate_radius;
use crate::convolve::{BlurKernel, SharpenKernel, blur_with_kernel, sharpen_with_kernel};
use crate::error::{FxError, Result, check_range};
use crate::image::{Bitmap, PixelBufferMut, Rect};
use crate::lut::{ChannelLuts, HslLuts, apply_channel_luts, apply_hsl_luts};
use crate::memo::Memo;
use crate::processor::PixelKernelProcessor;

/// One effect and its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    Blur {
        radius: f64,
        #[serde(default)]
        expand_edges: bool,
    },
    Sharpen {
        radius: f64,
        amount: i32,
    },
    BrightnessContrast(BrightnessContrast),
    ColorBalance(ColorBalance),
    ColorCurve(ColorCurve),
    Levels(Levels),
    HueSaturationLightness(HueSaturationLightness),
    Tint(Tint),
    RedEyeCorrection(RedEyeCorrection),
    ColorMatrix(ColorMatrix),
    /// Caller-supplied B, G, R, A tables.
    ColorLut(ChannelLuts),
    /// Caller-supplied hue, saturation, lightness and alpha tables.
    HslLut(HslLuts),
}

impl Effect {
    pub fn name(&self) -> &'static str {
        match self {
            Effect::Blur { .. } => "blur",
            Effect::Sharpen { .. } => "sharpen",
            Effect::BrightnessContrast(_) => "brightness_contrast",
            Effect::ColorBalance(_) => "color_balance",
            Effect::ColorCurve(_) => "color_curve",
            Effect::Levels(_) => "levels",
            Effect::HueSaturationLightness(_) => "hue_saturation_lightness",
            Effect::Tint(_) => "tint",
            Effect::RedEyeCorrection(_) => "red_eye_correction",
            Effect::ColorMatrix(_) => "color_matrix",
            Effect::ColorLut(_) => "color_lut",
            Effect::HslLut(_) => "hsl_lut",
        }
    }

    /// Check parameters without touching any pixels.
    pub fn validate(&self) -> Result<()> {
        match self {
            Effect::Blur { radius, .. } => validate_radius(*radius),
            Effect::Sharpen { radius, amount } => {
                validate_radius(*radius)?;
                check_range("amount", *amount, 0, 100)
            }
            Effect::BrightnessContrast(p) => p.validate(),
            Effect::ColorBalance(p) => p.validate(),
            Effect::ColorCurve(p) => p.validate(),
            Effect::Levels(p) => p.validate(),
            Effect::HueSaturationLightness(p) => p.validate(),
            Effect::Tint(p) => p.validate(),
            Effect::ColorMatrix(m) => m.validate(),
            Effect::RedEyeCorrection(_) | Effect::ColorLut(_) | Effect::HslLut(_) => Ok(()),
        }
    }

    /// Channel tables for the effects that reduce to one.
    fn channel_luts(&self) -> Result<ChannelLuts> {
        match self {
            Effect::BrightnessContrast(p) => p.luts(),
            Effect::ColorBalance(p) => p.luts(),
            Effect::ColorCurve(p) => p.luts(),
            Effect::Levels(p) => p.luts(),
            other => Err(FxError::Internal(format!(
                "{} has no channel tables",
                other.name()
            ))),
        }
    }
}

/// Applies [`Effect`]s, rebuilding kernels and tables only when the
/// parameters differ from the previous call.
#[derive(Debug, Clone, Default)]
pub struct EffectProcessor {
    processor: PixelKernelProcessor,
    blur: Memo<f64, BlurKernel>,
    sharpen: Memo<f64, SharpenKernel>,
    channel_luts: Memo<Effect, ChannelLuts>,
    hsl_luts: Memo<HueSaturationLightness, HslLuts>,
    tint: Memo<Tint, TintTable>,
}

impl EffectProcessor {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            processor: PixelKernelProcessor::from_config(config),
            ..Self::default()
        }
    }

    pub fn max_threads(&self) -> usize {
        self.processor.max_threads()
    }

    /// Apply `effect` to `region` of `buffer` and return the rectangle that
    /// was written. Only expanded-edge blur writes outside `region`.
    pub fn apply(
        &mut self,
        effect: &Effect,
        buffer: &mut PixelBufferMut<'_>,
        region: Rect,
    ) -> Result<Rect> {
        tracing::debug!("applying {} to {:?}", effect.name(), buffer);
        let processor = &self.processor;
        if let Effect::Blur {
            radius,
            expand_edges,
        } = effect
        {
            let kernel = self.blur.get_or_build(radius, |r| BlurKernel::new(*r))?;
            return blur_with_kernel(processor, buffer, region, kernel, *expand_edges);
        }

        effect.validate()?;
        let rect = PixelKernelProcessor::validate(buffer, &[], region)?;
        let threads = processor.max_threads();
        match effect {
            Effect::Blur { .. } => {}
            Effect::Sharpen { radius, amount } => {
                let kernel = self.sharpen.get_or_build(radius, |r| SharpenKernel::new(*r))?;
                sharpen_with_kernel(processor, buffer, rect, kernel, *amount)?;
            }
            Effect::HueSaturationLightness(p) => {
                let luts = self.hsl_luts.get_or_build(p, |p| p.luts())?;
                apply_hsl_luts(buffer, rect, luts, threads)?;
            }
            Effect::Tint(p) => {
                let table = self.tint.get_or_build(p, |p| p.table())?;
                if !table.is_identity() {
                    processor.for_each_pixel(buffer, rect, table)?;
                }
            }
            Effect::RedEyeCorrection(p) => apply_red_eye_reduction(buffer, rect, p, threads)?,
            Effect::ColorMatrix(m) => {
                if !m.is_identity() {
                    processor.for_each_pixel(buffer, rect, m)?;
                }
            }
            Effect::ColorLut(luts) => apply_channel_luts(buffer, rect, luts, threads)?,
            Effect::HslLut(luts) => apply_hsl_luts(buffer, rect, luts, threads)?,
            Effect::BrightnessContrast(_)
            | Effect::ColorBalance(_)
            | Effect::ColorCurve(_)
            | Effect::Levels(_) => {
                let luts = self.channel_luts.get_or_build(effect, Effect::channel_luts)?;
                apply_channel_luts(buffer, rect, luts, threads)?;
            }
        }
        Ok(rect)
    }
}

impl Bitmap {
    /// Copy of this bitmap with `effect` applied to all of it.
    ///
    /// An expanded-edge blur returns a bitmap grown by `ceil(radius)` on
    /// every side, with this bitmap composed into its center over a
    /// transparent border.
    pub fn apply_effect(&self, effect: &Effect, config: &EngineConfig) -> Result<Bitmap> {
        let mut fx = EffectProcessor::new(config);
        if let Effect::Blur {
            radius,
            expand_edges: true,
        } = effect
        {
            let reach = BlurKernel::new(*radius)?.reach();
            let mut out = self.expanded(reach)?;
            let source = Rect::new(reach, reach, self.width(), self.height());
            fx.apply(effect, &mut out.as_buffer_mut(), source)?;
            return Ok(out);
        }
        let mut out = self.clone();
        fx.apply(effect, &mut out.as_buffer_mut(), Rect::default())?;
        Ok(out)
    }
}
