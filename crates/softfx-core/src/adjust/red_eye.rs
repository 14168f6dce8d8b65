//! Red-eye reduction inside caller-marked rectangles.

use serde::{Deserialize, Serialize};

use crate::color;
use crate::error::Result;
use crate::image::{Bgra, PixelBufferMut, Rect};
use crate::lut::HslLuts;
use crate::processor::PixelKernelProcessor;

use super::hsl::{lightness_lut, saturation_lut};

/// Saturation shift applied to matching pixels.
pub const SATURATION_SHIFT: i32 = -100;
/// Lightness shift applied to matching pixels.
pub const LIGHTNESS_SHIFT: i32 = -60;

/// Rectangles (usually one per eye) to search for red pixels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RedEyeCorrection {
    pub areas: Vec<Rect>,
}

impl RedEyeCorrection {
    pub fn new(areas: impl Into<Vec<Rect>>) -> Self {
        Self {
            areas: areas.into(),
        }
    }

    /// Areas clipped to `region`. Empty areas and areas outside the region
    /// drop out.
    pub fn clipped_areas(&self, region: Rect) -> Vec<Rect> {
        self.areas
            .iter()
            .filter(|area| !area.is_empty())
            .filter_map(|area| area.intersect(&region))
            .collect()
    }
}

/// A pixel is red when `red * 256 / (green + blue)` exceeds 256. A zero
/// denominator always matches.
#[inline]
pub fn is_red(px: Bgra) -> bool {
    let gb = px.g as u32 + px.b as u32;
    gb == 0 || px.r as u32 * 256 / gb > 256
}

fn correction_luts() -> HslLuts {
    HslLuts {
        s: saturation_lut(SATURATION_SHIFT),
        l: lightness_lut(LIGHTNESS_SHIFT),
        ..HslLuts::default()
    }
}

pub fn apply_red_eye_reduction(
    buffer: &mut PixelBufferMut<'_>,
    region: Rect,
    params: &RedEyeCorrection,
    max_threads: usize,
) -> Result<()> {
    let region = PixelKernelProcessor::validate(buffer, &[], region)?;
    let areas = params.clipped_areas(region);
    let Some(bounds) = areas
        .iter()
        .copied()
        .reduce(|a, b| {
            let x = a.x.min(b.x);
            let y = a.y.min(b.y);
            let right = a.right().max(b.right());
            let bottom = a.bottom().max(b.bottom());
            Rect::new(x, y, (right - x as u64) as u32, (bottom - y as u64) as u32)
        })
    else {
        tracing::debug!("red-eye: no area inside the region");
        return Ok(());
    };

    tracing::debug!("red-eye over {} area(s), bounds {:?}", areas.len(), bounds);
    let luts = correction_luts();
    PixelKernelProcessor::new(max_threads).for_each_row(buffer, &[], bounds, |line| {
        let rows: Vec<&Rect> = areas
            .iter()
            .filter(|a| line.y >= a.y && (line.y as u64) < a.bottom())
            .collect();
        if rows.is_empty() {
            return;
        }
        for (i, px) in line.pixels.iter_mut().enumerate() {
            let x = line.x + i as u32;
            let inside = rows.iter().any(|a| x >= a.x && (x as u64) < a.right());
            if inside && is_red(*px) {
                *px = color::hsl_to_pixel(luts.map(color::pixel_to_hsl(*px)), px.a);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Bitmap;

    const RED: Bgra = Bgra::new(20, 30, 220, 255);
    const SKIN: Bgra = Bgra::new(120, 150, 200, 255);

    #[test]
    fn test_red_test_matches_dominant_red() {
        assert!(is_red(RED));
        assert!(!is_red(SKIN));
        assert!(is_red(Bgra::new(0, 0, 5, 255)));
        // r * 256 / (g + b) == 256 exactly is not red
        assert!(!is_red(Bgra::new(50, 50, 100, 255)));
    }

    #[test]
    fn test_marked_red_pixels_are_darkened_and_desaturated() {
        let mut bmp = Bitmap::filled(6, 6, RED);
        bmp.set_pixel(2, 2, SKIN);
        let params = RedEyeCorrection::new(vec![Rect::new(1, 1, 3, 3)]);
        apply_red_eye_reduction(&mut bmp.as_buffer_mut(), Rect::default(), &params, 2).unwrap();

        let fixed = bmp.pixel(1, 1);
        assert_eq!(fixed.r, fixed.g);
        assert_eq!(fixed.g, fixed.b);
        assert!(fixed.r < 100);
        assert_eq!(fixed.a, 255);
        assert_eq!(bmp.pixel(2, 2), SKIN);
        assert_eq!(bmp.pixel(0, 0), RED);
        assert_eq!(bmp.pixel(4, 4), RED);
    }

    #[test]
    fn test_overlapping_areas_correct_once() {
        let mut once = Bitmap::filled(5, 5, RED);
        let mut twice = once.clone();
        let single = RedEyeCorrection::new(vec![Rect::new(0, 0, 4, 4)]);
        let overlapping = RedEyeCorrection::new(vec![Rect::new(0, 0, 4, 4), Rect::new(1, 1, 2, 2)]);
        apply_red_eye_reduction(&mut once.as_buffer_mut(), Rect::default(), &single, 0).unwrap();
        apply_red_eye_reduction(&mut twice.as_buffer_mut(), Rect::default(), &overlapping, 0)
            .unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_area_outside_region_is_ignored() {
        let mut bmp = Bitmap::filled(8, 8, RED);
        let before = bmp.clone();
        let params = RedEyeCorrection::new(vec![Rect::new(5, 5, 2, 2)]);
        apply_red_eye_reduction(&mut bmp.as_buffer_mut(), Rect::new(0, 0, 4, 4), &params, 3)
            .unwrap();
        assert_eq!(bmp, before);
    }

    #[test]
    fn test_area_is_clipped_to_region() {
        let mut bmp = Bitmap::filled(8, 8, RED);
        let params = RedEyeCorrection::new(vec![Rect::new(2, 2, 6, 6)]);
        apply_red_eye_reduction(&mut bmp.as_buffer_mut(), Rect::new(0, 0, 4, 4), &params, 1)
            .unwrap();
        assert_ne!(bmp.pixel(3, 3), RED);
        assert_eq!(bmp.pixel(4, 4), RED);
    }
}
