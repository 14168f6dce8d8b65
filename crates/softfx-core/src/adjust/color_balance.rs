//! Per-channel color balance with 10-bit fixed-point gains.

use serde::{Deserialize, Serialize};

use crate::error::{Result, check_range};
use crate::image::{PixelBufferMut, Rect};
use crate::lut::{ChannelLuts, Lut, apply_channel_luts};

/// Shifts along the cyan-red, magenta-green and yellow-blue axes, each in
/// `-100..=100`. Positive values add red, green and blue respectively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColorBalance {
    pub cyan_red: i32,
    pub magenta_green: i32,
    pub yellow_blue: i32,
}

impl ColorBalance {
    pub fn validate(&self) -> Result<()> {
        check_range("cyan_red", self.cyan_red, -100, 100)?;
        check_range("magenta_green", self.magenta_green, -100, 100)?;
        check_range("yellow_blue", self.yellow_blue, -100, 100)
    }

    pub fn luts(&self) -> Result<ChannelLuts> {
        self.validate()?;
        Ok(ChannelLuts {
            b: gain_lut(self.yellow_blue),
            g: gain_lut(self.magenta_green),
            r: gain_lut(self.cyan_red),
            a: Lut::IDENTITY,
        })
    }
}

/// `v * (1024 + delta * 1024 / 100) >> 10`, clamped.
fn gain_lut(delta: i32) -> Lut {
    let gain = 1024 + delta * 1024 / 100;
    Lut::from_fn(|v| ((v as i32 * gain) >> 10).clamp(0, 255) as u8)
}

pub fn apply_color_balance(
    buffer: &mut PixelBufferMut<'_>,
    region: Rect,
    params: &ColorBalance,
    max_threads: usize,
) -> Result<()> {
    let luts = params.luts()?;
    tracing::debug!(
        "color balance {}/{}/{}",
        params.cyan_red,
        params.magenta_green,
        params.yellow_blue
    );
    apply_channel_luts(buffer, region, &luts, max_threads)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_shift_is_identity() {
        assert!(ColorBalance::default().luts().unwrap().is_identity());
    }

    #[test]
    fn test_fixed_point_gain() {
        let luts = ColorBalance {
            cyan_red: 50,
            magenta_green: -50,
            yellow_blue: -100,
        }
        .luts()
        .unwrap();
        // gain 1536 -> x1.5, gain 512 -> x0.5, gain 0 -> black
        assert_eq!(luts.r.get(100), 150);
        assert_eq!(luts.r.get(200), 255);
        assert_eq!(luts.g.get(101), 50);
        assert_eq!(luts.b.get(255), 0);
    }

    #[test]
    fn test_gain_truncates_toward_zero() {
        // 33 * 1024 / 100 = 337 (not 337.92)
        let lut = gain_lut(33);
        assert_eq!(lut.get(100), ((100 * (1024 + 337)) >> 10) as u8);
    }

    #[test]
    fn test_range_is_enforced() {
        let params = ColorBalance {
            cyan_red: 0,
            magenta_green: 101,
            yellow_blue: 0,
        };
        assert!(params.luts().is_err());
    }
}
