//! 8-bit HSL conversion and luminance helpers.
//!
//! All three HSL components are stored as bytes so that each one can index a
//! 256-entry lookup table. Hue uses 256 steps per turn (one step is 360/256
//! degrees) and wraps, so hue 256 is hue 0.

use crate::image::Bgra;

/// Hue, saturation, lightness, each quantized to `0..=255`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Hsl {
    pub h: u8,
    pub s: u8,
    pub l: u8,
}

/// Hue steps per full turn.
pub const HUE_STEPS: u32 = 256;

/// Convert degrees to the byte hue scale, rolling into one turn first.
pub fn hue_degrees_to_steps(degrees: f32) -> u8 {
    let rolled = degrees.rem_euclid(360.0);
    ((rolled * HUE_STEPS as f32 / 360.0).round() as u32 % HUE_STEPS) as u8
}

/// HSL lightness of a pixel: the midpoint of its largest and smallest
/// color channel.
#[inline]
pub fn lightness(r: u8, g: u8, b: u8) -> u8 {
    let max = r.max(g).max(b) as u32;
    let min = r.min(g).min(b) as u32;
    ((max + min + 1) / 2) as u8
}

/// Perceived luminance with Rec. 601 weights in 8-bit fixed point
/// (77 + 150 + 29 = 256).
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 77 + g as u32 * 150 + b as u32 * 29 + 128) >> 8) as u8
}

/// Convert an 8-bit RGB triple to byte-quantized HSL.
pub fn rgb_to_hsl(r: u8, g: u8, b: u8) -> Hsl {
    let max = r.max(g).max(b) as i32;
    let min = r.min(g).min(b) as i32;
    let l = ((max + min + 1) / 2) as u8;

    if max == min {
        return Hsl { h: 0, s: 0, l };
    }

    let delta = max - min;
    let sum = max + min;
    let s = if sum <= 255 {
        (delta * 255 + sum / 2) / sum
    } else {
        let inv = 510 - sum;
        (delta * 255 + inv / 2) / inv
    };

    let (r, g, b) = (r as f32, g as f32, b as f32);
    let (maxf, deltaf) = (max as f32, delta as f32);
    let sector = if r == maxf {
        (g - b) / deltaf
    } else if g == maxf {
        (b - r) / deltaf + 2.0
    } else {
        (r - g) / deltaf + 4.0
    };
    let degrees = (sector * 60.0).rem_euclid(360.0);

    Hsl {
        h: hue_degrees_to_steps(degrees),
        s: s.clamp(0, 255) as u8,
        l,
    }
}

/// Convert byte-quantized HSL back to 8-bit RGB.
pub fn hsl_to_rgb(hsl: Hsl) -> (u8, u8, u8) {
    if hsl.s == 0 {
        return (hsl.l, hsl.l, hsl.l);
    }

    let sat = hsl.s as f32 / 255.0;
    let lum = hsl.l as f32 / 255.0;
    let q = if lum < 0.5 {
        lum * (1.0 + sat)
    } else {
        lum + sat - lum * sat
    };
    let p = 2.0 * lum - q;
    let h = hsl.h as f32 / HUE_STEPS as f32;

    (
        to_byte(hue_channel(p, q, h + 1.0 / 3.0)),
        to_byte(hue_channel(p, q, h)),
        to_byte(hue_channel(p, q, h - 1.0 / 3.0)),
    )
}

/// One channel of the HSL trapezoid: `lo` and `hi` are the channel floor
/// and ceiling, `turn` the channel's hue position in turns.
fn hue_channel(lo: f32, hi: f32, turn: f32) -> f32 {
    let t = turn.rem_euclid(1.0);
    match (t * 6.0) as u32 {
        0 => lo + (hi - lo) * 6.0 * t,
        1 | 2 => hi,
        3 if t < 2.0 / 3.0 => lo + (hi - lo) * (2.0 / 3.0 - t) * 6.0,
        _ => lo,
    }
}

#[inline]
fn to_byte(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Pixel convenience wrappers.
#[inline]
pub fn pixel_to_hsl(px: Bgra) -> Hsl {
    rgb_to_hsl(px.r, px.g, px.b)
}

#[inline]
pub fn hsl_to_pixel(hsl: Hsl, alpha: u8) -> Bgra {
    let (r, g, b) = hsl_to_rgb(hsl);
    Bgra::from_rgba(r, g, b, alpha)
}
