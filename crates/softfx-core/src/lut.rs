//! 256-entry channel lookup tables and the loops that apply them.
//!
//! Every tone adjustment reduces to at most four [`Lut`]s. Channel tables
//! ([`ChannelLuts`]) index B, G, R and A directly; HSL tables ([`HslLuts`])
//! index the hue, saturation and lightness of each pixel and its alpha.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::color::{self, Hsl};
use crate::error::{FxError, Result};
use crate::image::{Bgra, PixelBufferMut, Rect};
use crate::processor::{PixelKernel, PixelKernelProcessor};

/// Byte-to-byte map over one channel.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct Lut([u8; 256]);

impl Lut {
    pub const IDENTITY: Lut = Lut(identity_table());

    pub const fn identity() -> Self {
        Self::IDENTITY
    }

    pub const fn from_table(table: [u8; 256]) -> Self {
        Self(table)
    }

    /// Build by evaluating `f` for every input byte.
    pub fn from_fn(mut f: impl FnMut(u8) -> u8) -> Self {
        let mut table = [0u8; 256];
        for (v, out) in table.iter_mut().enumerate() {
            *out = f(v as u8);
        }
        Self(table)
    }

    #[inline]
    pub fn get(&self, v: u8) -> u8 {
        self.0[v as usize]
    }

    pub fn as_table(&self) -> &[u8; 256] {
        &self.0
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Table equivalent to applying `self` and then `next`.
    pub fn then(&self, next: &Lut) -> Lut {
        Lut::from_fn(|v| next.get(self.get(v)))
    }
}

const fn identity_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = i as u8;
        i += 1;
    }
    table
}

impl Default for Lut {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl fmt::Debug for Lut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_identity() {
            write!(f, "Lut(identity)")
        } else {
            write!(f, "Lut({:?}..)", &self.0[..8])
        }
    }
}

impl TryFrom<Vec<u8>> for Lut {
    type Error = FxError;

    fn try_from(values: Vec<u8>) -> Result<Self> {
        let table: [u8; 256] = values.try_into().map_err(|v: Vec<u8>| {
            FxError::invalid(format!("a lookup table needs 256 entries, got {}", v.len()))
        })?;
        Ok(Self(table))
    }
}

impl From<Lut> for Vec<u8> {
    fn from(lut: Lut) -> Self {
        lut.0.to_vec()
    }
}

/// One table per stored channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelLuts {
    pub b: Lut,
    pub g: Lut,
    pub r: Lut,
    pub a: Lut,
}

impl ChannelLuts {
    /// Same table on B, G and R; alpha untouched.
    pub fn color(lut: Lut) -> Self {
        Self {
            b: lut.clone(),
            g: lut.clone(),
            r: lut,
            a: Lut::IDENTITY,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.b.is_identity() && self.g.is_identity() && self.r.is_identity() && self.a.is_identity()
    }
}

impl PixelKernel for ChannelLuts {
    #[inline]
    fn pixel(&self, px: Bgra) -> Bgra {
        Bgra::new(
            self.b.get(px.b),
            self.g.get(px.g),
            self.r.get(px.r),
            self.a.get(px.a),
        )
    }

    /// Both pixels travel as one 64-bit word; each byte is looked up in the
    /// table for its channel (byte index modulo 4).
    #[inline]
    fn pixel_pair(&self, pair: [Bgra; 2]) -> [Bgra; 2] {
        let tables = [&self.b, &self.g, &self.r, &self.a];
        let word = Bgra::pack_pair(pair);
        let mut out = 0u64;
        for i in 0..8 {
            let byte = (word >> (i * 8)) as u8;
            out |= (tables[i % 4].get(byte) as u64) << (i * 8);
        }
        Bgra::unpack_pair(out)
    }
}

/// Tables over hue, saturation and lightness plus a plain alpha table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HslLuts {
    pub h: Lut,
    pub s: Lut,
    pub l: Lut,
    pub a: Lut,
}

impl HslLuts {
    /// True when colors pass through unchanged, so the HSL round trip can
    /// be skipped.
    pub fn is_color_identity(&self) -> bool {
        self.h.is_identity() && self.s.is_identity() && self.l.is_identity()
    }

    pub fn is_identity(&self) -> bool {
        self.is_color_identity() && self.a.is_identity()
    }

    #[inline]
    pub fn map(&self, hsl: Hsl) -> Hsl {
        Hsl {
            h: self.h.get(hsl.h),
            s: self.s.get(hsl.s),
            l: self.l.get(hsl.l),
        }
    }
}

impl PixelKernel for HslLuts {
    #[inline]
    fn pixel(&self, px: Bgra) -> Bgra {
        let alpha = self.a.get(px.a);
        if self.is_color_identity() {
            return Bgra { a: alpha, ..px };
        }
        color::hsl_to_pixel(self.map(color::pixel_to_hsl(px)), alpha)
    }
}

/// Apply caller-supplied A, R, G, B tables to `region`.
pub fn apply_lookup_tables(
    buffer: &mut PixelBufferMut<'_>,
    region: Rect,
    lut_a: &Lut,
    lut_r: &Lut,
    lut_g: &Lut,
    lut_b: &Lut,
    max_threads: usize,
) -> Result<()> {
    let luts = ChannelLuts {
        b: lut_b.clone(),
        g: lut_g.clone(),
        r: lut_r.clone(),
        a: lut_a.clone(),
    };
    apply_channel_luts(buffer, region, &luts, max_threads)
}

/// Apply a prepared [`ChannelLuts`]; identity tables only validate.
pub fn apply_channel_luts(
    buffer: &mut PixelBufferMut<'_>,
    region: Rect,
    luts: &ChannelLuts,
    max_threads: usize,
) -> Result<()> {
    if luts.is_identity() {
        PixelKernelProcessor::validate(buffer, &[], region)?;
        return Ok(());
    }
    PixelKernelProcessor::new(max_threads).for_each_pixel(buffer, region, luts)
}

/// Apply alpha, hue, saturation and lightness tables to `region`.
pub fn apply_hsl_lookup_tables(
    buffer: &mut PixelBufferMut<'_>,
    region: Rect,
    lut_a: &Lut,
    lut_h: &Lut,
    lut_s: &Lut,
    lut_l: &Lut,
    max_threads: usize,
) -> Result<()> {
    let luts = HslLuts {
        h: lut_h.clone(),
        s: lut_s.clone(),
        l: lut_l.clone(),
        a: lut_a.clone(),
    };
    apply_hsl_luts(buffer, region, &luts, max_threads)
}

pub fn apply_hsl_luts(
    buffer: &mut PixelBufferMut<'_>,
    region: Rect,
    luts: &HslLuts,
    max_threads: usize,
) -> Result<()> {
    if luts.is_identity() {
        PixelKernelProcessor::validate(buffer, &[], region)?;
        return Ok(());
    }
    PixelKernelProcessor::new(max_threads).for_each_pixel(buffer, region, luts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Bitmap;

    fn sample_bitmap() -> Bitmap {
        let mut bmp = Bitmap::new(7, 5);
        for y in 0..5 {
            for x in 0..7 {
                let color = Bgra::new((x * 30) as u8, (y * 50) as u8, (x * y * 7) as u8, 200);
                bmp.set_pixel(x, y, color);
            }
        }
        bmp
    }

    #[test]
    fn test_identity_luts_leave_buffer_unchanged() {
        let mut bmp = sample_bitmap();
        let before = bmp.clone();
        let id = Lut::identity();
        let mut buf = bmp.as_buffer_mut();
        apply_lookup_tables(&mut buf, Rect::default(), &id, &id, &id, &id, 4).unwrap();
        assert_eq!(bmp, before);
    }

    #[test]
    fn test_channel_tables_hit_their_channels() {
        let mut bmp = Bitmap::filled(3, 1, Bgra::new(10, 20, 30, 40));
        let plus = |n: u8| Lut::from_fn(move |v| v.saturating_add(n));
        apply_lookup_tables(
            &mut bmp.as_buffer_mut(),
            Rect::default(),
            &plus(4),
            &plus(3),
            &plus(2),
            &plus(1),
            1,
        )
        .unwrap();
        let expected = Bgra::new(11, 22, 33, 44);
        assert!(bmp.pixels().iter().all(|&px| px == expected));
    }

    #[test]
    fn test_pair_path_matches_single_path() {
        let luts = ChannelLuts {
            b: Lut::from_fn(|v| v.wrapping_mul(3)),
            g: Lut::from_fn(|v| 255 - v),
            r: Lut::from_fn(|v| v / 2),
            a: Lut::from_fn(|v| v | 1),
        };
        let pair = [Bgra::new(1, 2, 3, 4), Bgra::new(250, 128, 77, 0)];
        let single = [luts.pixel(pair[0]), luts.pixel(pair[1])];
        assert_eq!(luts.pixel_pair(pair), single);
    }

    #[test]
    fn test_then_composes_in_order() {
        let double = Lut::from_fn(|v| v.saturating_mul(2));
        let invert = Lut::from_fn(|v| 255 - v);
        let both = double.then(&invert);
        assert_eq!(both.get(100), 55);
        assert_eq!(both.get(200), 0);
    }

    #[test]
    fn test_hsl_identity_only_applies_alpha() {
        let mut bmp = sample_bitmap();
        let alpha = Lut::from_fn(|_| 9);
        let id = Lut::identity();
        let mut buf = bmp.as_buffer_mut();
        apply_hsl_lookup_tables(&mut buf, Rect::default(), &alpha, &id, &id, &id, 2).unwrap();
        let original = sample_bitmap();
        for (px, orig) in bmp.pixels().iter().zip(original.pixels()) {
            assert_eq!(*px, Bgra { a: 9, ..*orig });
        }
    }

    #[test]
    fn test_hsl_lightness_table_darkens() {
        let mut bmp = Bitmap::filled(2, 2, Bgra::from_rgba(200, 100, 50, 255));
        let id = Lut::identity();
        let half = Lut::from_fn(|v| v / 2);
        let mut buf = bmp.as_buffer_mut();
        apply_hsl_lookup_tables(&mut buf, Rect::default(), &id, &id, &id, &half, 0).unwrap();
        let px = bmp.pixel(0, 0);
        assert!(px.r < 200 && px.g < 100);
        assert_eq!(px.a, 255);
    }

    #[test]
    fn test_lut_serde_requires_256_entries() {
        let lut = Lut::from_fn(|v| v ^ 0x55);
        let json = serde_json::to_string(&lut).unwrap();
        let back: Lut = serde_json::from_str(&json).unwrap();
        assert_eq!(back, lut);
        assert!(serde_json::from_str::<Lut>("[1, 2, 3]").is_err());
    }
}
