//! Photographic curve adjustments: exposure, density, contrast, highlight,
//! shadow, midtone and white/black saturation.
//!
//! Exposure and density are straight offsets. Every other kind bends a
//! quadratic Bezier chain whose control points depend on the kind and
//! on the adjustment value.

use serde::{Deserialize, Serialize};

use crate::curve::ToneCurve;
use crate::error::{FxError, Result};
use crate::image::{PixelBufferMut, Rect};
use crate::lut::{ChannelLuts, Lut, apply_channel_luts};

/// Which tonal property a [`ColorCurve`] changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveAdjustment {
    /// Adds the value to every channel. `-255..=255`.
    Exposure,
    /// Subtracts the value from every channel. `-255..=255`.
    Density,
    /// S-curve around the midpoint. `-100..=100`.
    Contrast,
    /// Bends the upper quarter. `-100..=100`.
    Highlight,
    /// Bends the lower quarter. `-100..=100`.
    Shadow,
    /// Lifts or lowers the midpoint. `-100..=100`.
    Midtone,
    /// Input level that maps to full white. `0..=255`.
    WhiteSaturation,
    /// Input level that maps to full black. `0..=255`.
    BlackSaturation,
}

impl CurveAdjustment {
    /// Inclusive range of accepted adjustment values.
    pub const fn range(self) -> (i32, i32) {
        match self {
            Self::Exposure | Self::Density => (-255, 255),
            Self::Contrast | Self::Highlight | Self::Shadow | Self::Midtone => (-100, 100),
            Self::WhiteSaturation | Self::BlackSaturation => (0, 255),
        }
    }

    /// Value that leaves the image unchanged.
    pub const fn neutral(self) -> i32 {
        match self {
            Self::WhiteSaturation => 255,
            _ => 0,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Exposure => "exposure",
            Self::Density => "density",
            Self::Contrast => "contrast",
            Self::Highlight => "highlight",
            Self::Shadow => "shadow",
            Self::Midtone => "midtone",
            Self::WhiteSaturation => "white saturation",
            Self::BlackSaturation => "black saturation",
        }
    }
}

/// Channels a curve is applied to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveChannel {
    #[default]
    All,
    Red,
    Green,
    Blue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColorCurve {
    pub adjustment: CurveAdjustment,
    #[serde(default)]
    pub channel: CurveChannel,
    pub value: i32,
}

impl ColorCurve {
    pub const fn new(adjustment: CurveAdjustment, value: i32) -> Self {
        Self {
            adjustment,
            channel: CurveChannel::All,
            value,
        }
    }

    pub const fn on_channel(mut self, channel: CurveChannel) -> Self {
        self.channel = channel;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let (min, max) = self.adjustment.range();
        if self.value < min || self.value > max {
            return Err(FxError::invalid(format!(
                "{} adjustment {} is outside [{min}, {max}]",
                self.adjustment.label(),
                self.value
            )));
        }
        Ok(())
    }

    /// Table for the selected adjustment, before channel routing.
    pub fn lut(&self) -> Result<Lut> {
        self.validate()?;
        let value = self.value;
        let lut = match self.adjustment {
            CurveAdjustment::Exposure => Lut::from_fn(|v| (v as i32 + value).clamp(0, 255) as u8),
            CurveAdjustment::Density => Lut::from_fn(|v| (v as i32 - value).clamp(0, 255) as u8),
            kind => Lut::from_table(curve_for(kind, value)?.to_table()),
        };
        Ok(lut)
    }

    pub fn luts(&self) -> Result<ChannelLuts> {
        let lut = self.lut()?;
        Ok(match self.channel {
            CurveChannel::All => ChannelLuts::color(lut),
            CurveChannel::Red => ChannelLuts {
                r: lut,
                ..ChannelLuts::default()
            },
            CurveChannel::Green => ChannelLuts {
                g: lut,
                ..ChannelLuts::default()
            },
            CurveChannel::Blue => ChannelLuts {
                b: lut,
                ..ChannelLuts::default()
            },
        })
    }
}

/// Control points for the curve-based kinds. `value` is already in range.
fn curve_for(kind: CurveAdjustment, value: i32) -> Result<ToneCurve> {
    let quarter = value as f32 / 100.0 * 0.25;
    let points = match kind {
        CurveAdjustment::Contrast => vec![
            [0.0, 0.0],
            [0.25, 0.25 - quarter],
            [0.5, 0.5],
            [0.75, 0.75 + quarter],
            [1.0, 1.0],
        ],
        CurveAdjustment::Highlight => vec![
            [0.0, 0.0],
            [0.25, 0.25],
            [0.5, 0.5],
            [0.75, 0.75 + quarter],
            [1.0, 1.0],
        ],
        CurveAdjustment::Shadow => vec![
            [0.0, 0.0],
            [0.25, 0.25 + quarter],
            [0.5, 0.5],
            [0.75, 0.75],
            [1.0, 1.0],
        ],
        CurveAdjustment::Midtone => vec![[0.0, 0.0], [0.5, 0.5 + value as f32 / 200.0], [1.0, 1.0]],
        CurveAdjustment::WhiteSaturation => {
            return Ok(ToneCurve::line([0.0, 0.0], [value as f32 / 255.0, 1.0]));
        }
        CurveAdjustment::BlackSaturation => {
            return Ok(ToneCurve::line([value as f32 / 255.0, 0.0], [1.0, 1.0]));
        }
        CurveAdjustment::Exposure | CurveAdjustment::Density => {
            return Err(FxError::invalid(format!(
                "{} is an offset, not a curve",
                kind.label()
            )));
        }
    };
    ToneCurve::new(points)
}

pub fn apply_color_curve(
    buffer: &mut PixelBufferMut<'_>,
    region: Rect,
    params: &ColorCurve,
    max_threads: usize,
) -> Result<()> {
    let luts = params.luts()?;
    tracing::debug!(
        "color curve {} {} on {:?}",
        params.adjustment.label(),
        params.value,
        params.channel
    );
    apply_channel_luts(buffer, region, &luts, max_threads)
}
