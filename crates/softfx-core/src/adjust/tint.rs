//! Tint toward a single hue while keeping each pixel's luminance.

use serde::{Deserialize, Serialize};

use crate::color::{self, Hsl, hue_degrees_to_steps};
use crate::error::{Result, check_range};
use crate::image::{Bgra, PixelBufferMut, Rect};
use crate::processor::{PixelKernel, PixelKernelProcessor};

use super::{clamp_byte, div_round};

/// Hue in degrees (`-180..=180`) and strength in `-100..=100`. A negative
/// amount tints toward the complementary hue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tint {
    pub hue: i32,
    pub amount: i32,
}

impl Tint {
    pub const fn new(hue: i32, amount: i32) -> Self {
        Self { hue, amount }
    }

    pub fn validate(&self) -> Result<()> {
        check_range("hue", self.hue, -180, 180)?;
        check_range("amount", self.amount, -100, 100)
    }

    pub fn table(&self) -> Result<TintTable> {
        self.validate()?;
        let degrees = if self.amount < 0 {
            self.hue + 180
        } else {
            self.hue
        };
        let h = hue_degrees_to_steps(degrees as f32);
        let mut colors = [[0u8; 3]; 256];
        for (l, rgb) in colors.iter_mut().enumerate() {
            let (r, g, b) = color::hsl_to_rgb(Hsl {
                h,
                s: 255,
                l: l as u8,
            });
            *rgb = [r, g, b];
        }
        Ok(TintTable {
            colors,
            weight: self.amount.abs(),
        })
    }
}

/// Fully saturated tint color for every lightness, plus the blend weight
/// in percent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TintTable {
    colors: [[u8; 3]; 256],
    weight: i32,
}

impl TintTable {
    /// RGB of the tint color at lightness `l`.
    pub fn color_at(&self, l: u8) -> [u8; 3] {
        self.colors[l as usize]
    }

    pub fn weight(&self) -> i32 {
        self.weight
    }

    pub fn is_identity(&self) -> bool {
        self.weight == 0
    }
}

impl PixelKernel for TintTable {
    #[inline]
    fn pixel(&self, px: Bgra) -> Bgra {
        let [tr, tg, tb] = self.color_at(color::lightness(px.r, px.g, px.b));
        let (keep, weight) = (100 - self.weight, self.weight);
        let mix = |orig: u8, tint: u8| div_round(orig as i32 * keep + tint as i32 * weight, 100);
        let (r, g, b) = (mix(px.r, tr), mix(px.g, tg), mix(px.b, tb));

        // put back the luminance lost in the blend
        let target = color::luma(px.r, px.g, px.b) as i32;
        let got = color::luma(clamp_byte(r), clamp_byte(g), clamp_byte(b)) as i32;
        let diff = target - got;
        Bgra::new(
            clamp_byte(b + diff),
            clamp_byte(g + diff),
            clamp_byte(r + diff),
            px.a,
        )
    }
}

pub fn apply_tint(
    buffer: &mut PixelBufferMut<'_>,
    region: Rect,
    params: &Tint,
    max_threads: usize,
) -> Result<()> {
    let table = params.table()?;
    if table.is_identity() {
        PixelKernelProcessor::validate(buffer, &[], region)?;
        return Ok(());
    }
    tracing::debug!("tint hue {} amount {}", params.hue, params.amount);
    PixelKernelProcessor::new(max_threads).for_each_pixel(buffer, region, &table)
}
