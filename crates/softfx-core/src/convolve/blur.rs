//! Two-pass weighted moving-average blur.
//!
//! Rows are blurred into an engine-owned scratch bitmap, then columns of the
//! scratch are blurred back into the caller's buffer. Taps that fall outside
//! the processed rectangle are dropped from both the weighted sum and the
//! weight total, so edges are averaged over fewer pixels instead of
//! replicated.

use crate::error::{FxError, Result};
use crate::image::{Bgra, Bitmap, PixelBuffer, PixelBufferMut, Rect};
use crate::processor::PixelKernelProcessor;

use super::kernel::BlurKernel;

/// Blur `region` of `buffer`, returning the rectangle that was written.
///
/// With `expand_edges` the buffer is a destination already grown by
/// `ceil(radius)` on every side with the source composed into its center;
/// `region` names the source's place in it and the written rectangle grows
/// by `ceil(radius)`. An empty region then means the whole destination.
pub fn apply_blur(
    buffer: &mut PixelBufferMut<'_>,
    region: Rect,
    radius: f64,
    expand_edges: bool,
    max_threads: usize,
) -> Result<Rect> {
    let kernel = BlurKernel::new(radius)?;
    blur_with_kernel(
        &PixelKernelProcessor::new(max_threads),
        buffer,
        region,
        &kernel,
        expand_edges,
    )
}

/// [`apply_blur`] with a prepared kernel.
pub fn blur_with_kernel(
    processor: &PixelKernelProcessor,
    buffer: &mut PixelBufferMut<'_>,
    region: Rect,
    kernel: &BlurKernel,
    expand_edges: bool,
) -> Result<Rect> {
    let rect = blur_rect(buffer, region, kernel.reach(), expand_edges)?;
    if kernel.is_identity() || rect.is_empty() {
        return Ok(rect);
    }
    tracing::debug!(
        "blur radius {} over {}x{} at ({}, {})",
        kernel.radius(),
        rect.width,
        rect.height,
        rect.x,
        rect.y
    );

    let mut scratch = Bitmap::new(rect.width, rect.height);
    {
        let source = buffer.as_buffer().crop(rect)?;
        processor.for_each_row(&mut scratch.as_buffer_mut(), &[source], Rect::default(), |line| {
            blur_row(kernel, line.sources[0].row(line.y), line.pixels);
        })?;
    }

    let staged = scratch.as_buffer();
    processor.for_each_row(&mut buffer.crop_mut(rect)?, &[staged], Rect::default(), |line| {
        blur_column(kernel, &line.sources[0], line.y, line.pixels);
    })?;
    Ok(rect)
}

/// Rectangle the blur reads and writes.
fn blur_rect(
    buffer: &PixelBufferMut<'_>,
    region: Rect,
    reach: u32,
    expand_edges: bool,
) -> Result<Rect> {
    let resolved = PixelKernelProcessor::validate(buffer, &[], region)?;
    if !expand_edges || region.is_empty() {
        return Ok(resolved);
    }
    region
        .inflate(reach)
        .filter(|grown| buffer.bounds().contains_rect(grown))
        .ok_or_else(|| {
            FxError::invalid(format!(
                "region {region:?} grown by {reach} does not fit the {}x{} destination",
                buffer.width(),
                buffer.height()
            ))
        })
}

#[inline]
fn accumulate(acc: &mut [u64; 4], kernel: &BlurKernel, offset: u32, px: Bgra) {
    acc[0] += kernel.product(offset, px.b) as u64;
    acc[1] += kernel.product(offset, px.g) as u64;
    acc[2] += kernel.product(offset, px.r) as u64;
    acc[3] += kernel.product(offset, px.a) as u64;
}

#[inline]
fn average(acc: &[u64; 4], total: u64) -> Bgra {
    let ch = |sum: u64| ((sum + total / 2) / total).min(255) as u8;
    Bgra::new(ch(acc[0]), ch(acc[1]), ch(acc[2]), ch(acc[3]))
}

fn blur_row(kernel: &BlurKernel, src: &[Bgra], out: &mut [Bgra]) {
    let reach = kernel.reach() as usize;
    let last = src.len() - 1;
    for (x, px) in out.iter_mut().enumerate() {
        let lo = x.saturating_sub(reach);
        let hi = (x + reach).min(last);
        let mut acc = [0u64; 4];
        let mut total = 0u64;
        for (i, &tap) in src[lo..=hi].iter().enumerate() {
            let offset = (lo + i).abs_diff(x) as u32;
            accumulate(&mut acc, kernel, offset, tap);
            total += kernel.weight(offset) as u64;
        }
        *px = average(&acc, total);
    }
}

fn blur_column(kernel: &BlurKernel, src: &PixelBuffer<'_>, y: u32, out: &mut [Bgra]) {
    let lo = y.saturating_sub(kernel.reach());
    let hi = y.saturating_add(kernel.reach()).min(src.height() - 1);
    let mut acc = vec![[0u64; 4]; out.len()];
    let mut total = 0u64;
    for row in lo..=hi {
        let offset = row.abs_diff(y);
        total += kernel.weight(offset) as u64;
        for (cell, &tap) in acc.iter_mut().zip(src.row(row)) {
            accumulate(cell, kernel, offset, tap);
        }
    }
    for (px, cell) in out.iter_mut().zip(&acc) {
        *px = average(cell, total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Bgra = Bgra::new(255, 255, 255, 255);

    fn dot(size: u32) -> Bitmap {
        let mut bmp = Bitmap::filled(size, size, Bgra::new(0, 0, 0, 255));
        bmp.set_pixel(size / 2, size / 2, WHITE);
        bmp
    }

    fn noise(width: u32, height: u32) -> Bitmap {
        let mut bmp = Bitmap::new(width, height);
        let mut state = 0x2545_f491u32;
        for y in 0..height {
            for x in 0..width {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                let [b, g, r, a] = state.to_le_bytes();
                bmp.set_pixel(x, y, Bgra::new(b, g, r, a));
            }
        }
        bmp
    }

    #[test]
    fn test_white_stays_white() {
        let mut bmp = Bitmap::filled(4, 4, WHITE);
        let rect = apply_blur(&mut bmp.as_buffer_mut(), Rect::default(), 1.0, false, 2).unwrap();
        assert_eq!(rect, Rect::from_size(4, 4));
        assert!(bmp.pixels().iter().all(|&px| px == WHITE));
    }

    #[test]
    fn test_zero_radius_is_noop() {
        let mut bmp = noise(9, 7);
        let before = bmp.clone();
        apply_blur(&mut bmp.as_buffer_mut(), Rect::default(), 0.0, false, 4).unwrap();
        assert_eq!(bmp, before);
    }

    #[test]
    fn test_tiny_radius_keeps_pixels() {
        let mut bmp = noise(6, 6);
        let before = bmp.clone();
        apply_blur(&mut bmp.as_buffer_mut(), Rect::default(), 1e-6, false, 1).unwrap();
        assert_eq!(bmp, before);
    }

    #[test]
    fn test_dot_spreads_symmetrically() {
        let mut bmp = dot(7);
        apply_blur(&mut bmp.as_buffer_mut(), Rect::default(), 1.0, false, 0).unwrap();
        let center = bmp.pixel(3, 3);
        assert!(center.r < 255 && center.r > 0);
        assert_eq!(bmp.pixel(2, 3), bmp.pixel(4, 3));
        assert_eq!(bmp.pixel(3, 2), bmp.pixel(3, 4));
        assert_eq!(bmp.pixel(2, 2), bmp.pixel(4, 4));
        assert!(bmp.pixel(2, 3).r > 0);
        assert_eq!(bmp.pixel(0, 0).r, 0);
        assert_eq!(center.a, 255);
    }

    #[test]
    fn test_taps_outside_region_are_excluded() {
        let mut bmp = Bitmap::filled(8, 8, Bgra::new(0, 0, 0, 0));
        let region = Rect::new(2, 2, 4, 4);
        for y in 2..6 {
            for x in 2..6 {
                bmp.set_pixel(x, y, WHITE);
            }
        }
        let written = apply_blur(&mut bmp.as_buffer_mut(), region, 2.0, false, 3).unwrap();
        assert_eq!(written, region);
        for y in 0..8 {
            for x in 0..8 {
                let inside = (2..6).contains(&x) && (2..6).contains(&y);
                let expected = if inside { WHITE } else { Bgra::new(0, 0, 0, 0) };
                assert_eq!(bmp.pixel(x, y), expected, "({x}, {y})");
            }
        }
    }

    #[test]
    fn test_expand_edges_grows_written_rect() {
        let source = Bitmap::filled(4, 4, WHITE);
        let mut dest = source.expanded(2).unwrap();
        let source_rect = Rect::new(2, 2, 4, 4);
        let written = apply_blur(&mut dest.as_buffer_mut(), source_rect, 1.5, true, 2).unwrap();
        assert_eq!(written, Rect::from_size(8, 8));
        // the transparent border picks up some of the image
        assert!(dest.pixel(1, 3).a > 0);
        assert!(dest.pixel(3, 3).a < 255);
    }

    #[test]
    fn test_expand_edges_must_fit_destination() {
        let mut bmp = noise(6, 6);
        let before = bmp.clone();
        let source_rect = Rect::new(1, 1, 4, 4);
        let err = apply_blur(&mut bmp.as_buffer_mut(), source_rect, 2.0, true, 1);
        assert!(matches!(err, Err(FxError::InvalidArgument(_))));
        assert_eq!(bmp, before);
    }

    #[test]
    fn test_extreme_radius_runs() {
        let mut bmp = noise(5, 3);
        apply_blur(&mut bmp.as_buffer_mut(), Rect::default(), 255.0, false, 2).unwrap();
        // every tap reaches the whole image, so columns agree
        let first = bmp.pixel(0, 0);
        assert!(bmp.pixels().iter().all(|px| px.a.abs_diff(first.a) <= 64));
    }

    #[test]
    fn test_output_is_thread_count_independent() {
        let region = Rect::new(1, 2, 20, 15);
        let reference = {
            let mut bmp = noise(23, 19);
            apply_blur(&mut bmp.as_buffer_mut(), region, 3.7, false, 0).unwrap();
            bmp
        };
        for threads in [1, 2, 8] {
            let mut bmp = noise(23, 19);
            apply_blur(&mut bmp.as_buffer_mut(), region, 3.7, false, threads).unwrap();
            assert_eq!(bmp, reference, "threads = {threads}");
        }
    }

    #[test]
    fn test_bad_radius_leaves_buffer_untouched() {
        let mut bmp = noise(4, 4);
        let before = bmp.clone();
        for radius in [-1.0, 256.0] {
            let result = apply_blur(&mut bmp.as_buffer_mut(), Rect::default(), radius, false, 1);
            assert!(result.is_err(), "radius {radius}");
        }
        assert_eq!(bmp, before);
    }
}
