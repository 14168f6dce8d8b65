//! Brightness and contrast through one shared color table.

use serde::{Deserialize, Serialize};

use crate::error::{Result, check_range};
use crate::image::{PixelBufferMut, Rect};
use crate::lut::{ChannelLuts, Lut, apply_channel_luts};

/// Scaling pivot; values equal to it are unaffected by contrast alone.
const PIVOT: f32 = 127.0;

/// Brightness in `-255..=255`, contrast in `-100..=100`. Zero for both is
/// the identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BrightnessContrast {
    pub brightness: i32,
    pub contrast: i32,
}

impl BrightnessContrast {
    pub fn validate(&self) -> Result<()> {
        check_range("brightness", self.brightness, -255, 255)?;
        check_range("contrast", self.contrast, -100, 100)
    }

    /// Shared R/G/B table.
    ///
    /// Positive contrast stretches around the pivot with gain
    /// `101 / (101 - contrast)` and adds brightness *before* stretching.
    /// Negative contrast compresses with gain `(100 + contrast) / 101` and
    /// adds brightness *after* compressing.
    pub fn lut(&self) -> Result<Lut> {
        self.validate()?;
        let brightness = self.brightness as f32;
        let contrast = self.contrast as f32;

        let lut = if self.contrast >= 0 {
            let gain = 101.0 / (101.0 - contrast);
            Lut::from_fn(|v| to_byte((v as f32 + brightness - PIVOT) * gain + PIVOT))
        } else {
            let gain = (100.0 + contrast) / 101.0;
            Lut::from_fn(|v| to_byte((v as f32 - PIVOT) * gain + PIVOT + brightness))
        };
        Ok(lut)
    }

    pub fn luts(&self) -> Result<ChannelLuts> {
        Ok(ChannelLuts::color(self.lut()?))
    }
}

#[inline]
fn to_byte(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

pub fn apply_brightness_contrast(
    buffer: &mut PixelBufferMut<'_>,
    region: Rect,
    params: &BrightnessContrast,
    max_threads: usize,
) -> Result<()> {
    let luts = params.luts()?;
    tracing::debug!(
        "brightness/contrast {}/{}",
        params.brightness,
        params.contrast
    );
    apply_channel_luts(buffer, region, &luts, max_threads)
}
