//! Two-pass unsharp sharpening.
//!
//! The sharpen kernel is run along rows into a signed scratch grid and then
//! down its columns. The response is compared against the flat-field
//! response of the original value, and the difference, scaled down by the
//! kernel gain and `100 / amount` (both squared), is added back. Taps that
//! fall outside the region read as mid-gray rather than being dropped.
//! Only B, G and R are touched.

use crate::error::{Result, check_range};
use crate::image::{Bgra, PixelBufferMut, Rect};
use crate::processor::PixelKernelProcessor;

use super::kernel::SharpenKernel;

/// Value substituted for taps outside the processed rectangle.
pub const MID_GRAY: u8 = 127;

/// Sharpen `region` of `buffer`. `amount` is a percentage in `0..=100`;
/// zero amount or zero radius leaves the buffer as is.
pub fn apply_sharpen(
    buffer: &mut PixelBufferMut<'_>,
    region: Rect,
    radius: f64,
    amount: i32,
    max_threads: usize,
) -> Result<()> {
    check_range("amount", amount, 0, 100)?;
    let kernel = SharpenKernel::new(radius)?;
    sharpen_with_kernel(
        &PixelKernelProcessor::new(max_threads),
        buffer,
        region,
        &kernel,
        amount,
    )
}

/// [`apply_sharpen`] with a prepared kernel.
pub fn sharpen_with_kernel(
    processor: &PixelKernelProcessor,
    buffer: &mut PixelBufferMut<'_>,
    region: Rect,
    kernel: &SharpenKernel,
    amount: i32,
) -> Result<()> {
    check_range("amount", amount, 0, 100)?;
    let rect = PixelKernelProcessor::validate(buffer, &[], region)?;
    if amount == 0 || kernel.reach() == 0 || rect.is_empty() {
        return Ok(());
    }
    tracing::debug!(
        "sharpen radius {} amount {} over {}x{} at ({}, {})",
        kernel.radius(),
        amount,
        rect.width,
        rect.height,
        rect.x,
        rect.y
    );

    let width = rect.width as usize;
    let mut scratch = vec![[0i64; 3]; width * rect.height as usize];
    {
        let source = buffer.as_buffer().crop(rect)?;
        processor.for_each_scratch_row(&mut scratch, width, |y, line| {
            sharpen_row(kernel, source.row(y), line);
        })?;
    }

    let gain = kernel.gain() as f64;
    let scale = (amount as f64 / 100.0).powi(2) / (gain * gain);
    let scratch = &scratch;
    processor.for_each_row(&mut buffer.crop_mut(rect)?, &[], Rect::default(), |line| {
        sharpen_column(kernel, scratch, width, line.y, line.pixels, scale);
    })
}

#[inline]
fn channels(px: Bgra) -> [u8; 3] {
    [px.b, px.g, px.r]
}

fn sharpen_row(kernel: &SharpenKernel, src: &[Bgra], out: &mut [[i64; 3]]) {
    let reach = kernel.reach() as usize;
    for (x, cell) in out.iter_mut().enumerate() {
        let center = channels(src[x]);
        let mut acc = center.map(|v| kernel.center() * v as i64);
        for k in 1..=reach {
            let left = x.checked_sub(k).map(|i| src[i]);
            let right = src.get(x + k).copied();
            for tap in [left, right] {
                let values = tap.map_or([MID_GRAY; 3], channels);
                for (sum, v) in acc.iter_mut().zip(values) {
                    *sum -= kernel.side_product(k as u32, v);
                }
            }
        }
        *cell = acc;
    }
}

fn sharpen_column(
    kernel: &SharpenKernel,
    scratch: &[[i64; 3]],
    width: usize,
    y: u32,
    out: &mut [Bgra],
    scale: f64,
) {
    let height = (scratch.len() / width) as u32;
    let mid = kernel.gain() * MID_GRAY as i64;
    let flat = kernel.gain() * kernel.gain();

    let mut acc: Vec<[i64; 3]> = scratch_row(scratch, width, y)
        .iter()
        .map(|&h| h.map(|v| kernel.center() * v))
        .collect();
    for k in 1..=kernel.reach() {
        let side = kernel.side(k);
        for neighbor in [y.checked_sub(k), y.checked_add(k).filter(|&r| r < height)] {
            match neighbor {
                Some(row) => {
                    for (sum, h) in acc.iter_mut().zip(scratch_row(scratch, width, row)) {
                        for (c, v) in sum.iter_mut().zip(h) {
                            *c -= side * v;
                        }
                    }
                }
                None => {
                    for sum in acc.iter_mut() {
                        for c in sum.iter_mut() {
                            *c -= side * mid;
                        }
                    }
                }
            }
        }
    }

    for (px, response) in out.iter_mut().zip(&acc) {
        let original = channels(*px);
        let mut sharpened = [0u8; 3];
        for c in 0..3 {
            let v = original[c] as i64;
            let delta = (response[c] - flat * v) as f64;
            sharpened[c] = (v as f64 + delta * scale).round().clamp(0.0, 255.0) as u8;
        }
        let [b, g, r] = sharpened;
        *px = Bgra::new(b, g, r, px.a);
    }
}

#[inline]
fn scratch_row(scratch: &[[i64; 3]], width: usize, row: u32) -> &[[i64; 3]] {
    let start = row as usize * width;
    &scratch[start..start + width]
}
