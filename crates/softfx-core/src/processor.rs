//! Scanline-partitioned parallel pixel processing.
//!
//! Every effect funnels through [`PixelKernelProcessor`]. A region's rows are
//! cut into `max_threads + 1` contiguous bands; `max_threads` bands go to a
//! per-call worker pool and the calling thread processes the first band
//! itself. Bands never overlap, so workers share no mutable state and need
//! no locks. The split depends only on region height and thread count, which
//! keeps output bit-identical for every thread count.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::config::EngineConfig;
use crate::error::{FxError, Result};
use crate::image::{Bgra, PixelBuffer, PixelBufferMut, Rect};

/// Contiguous run of scanlines owned by one worker for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkPartition {
    /// First row, relative to the region's top edge.
    pub first_row: u32,
    pub rows: u32,
}

/// Split `height` rows into at most `max_threads + 1` near-equal bands.
///
/// The first `height % parts` bands carry one extra row. Bands are never
/// empty, so a short region gets fewer bands than requested.
pub fn partition_rows(height: u32, max_threads: usize) -> Vec<WorkPartition> {
    if height == 0 {
        return Vec::new();
    }
    let parts = (max_threads as u64).saturating_add(1).min(u64::from(height)) as u32;
    let base = height / parts;
    let extra = height % parts;

    let mut bands = Vec::with_capacity(parts as usize);
    let mut first_row = 0;
    for i in 0..parts {
        let rows = base + u32::from(i < extra);
        bands.push(WorkPartition { first_row, rows });
        first_row += rows;
    }
    bands
}

/// One scanline of the target buffer, clipped to the region.
pub struct Scanline<'a> {
    /// Absolute row in the target buffer.
    pub y: u32,
    /// Absolute column of `pixels[0]`.
    pub x: u32,
    pub pixels: &'a mut [Bgra],
    /// Read-only buffers passed alongside the target, same dimensions.
    pub sources: &'a [PixelBuffer<'a>],
}

/// Point operation applied independently to every pixel.
pub trait PixelKernel: Sync {
    fn pixel(&self, px: Bgra) -> Bgra;

    /// Two horizontally adjacent pixels at once. Implementations that can
    /// work on a packed 64-bit word override this.
    #[inline]
    fn pixel_pair(&self, pair: [Bgra; 2]) -> [Bgra; 2] {
        [self.pixel(pair[0]), self.pixel(pair[1])]
    }
}

/// Adapts a closure into a [`PixelKernel`].
pub struct PerPixel<F>(pub F);

impl<F> PixelKernel for PerPixel<F>
where
    F: Fn(Bgra) -> Bgra + Sync,
{
    #[inline]
    fn pixel(&self, px: Bgra) -> Bgra {
        (self.0)(px)
    }
}

/// Fork-join driver for per-scanline and per-pixel callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelKernelProcessor {
    max_threads: usize,
}

impl PixelKernelProcessor {
    pub const fn new(max_threads: usize) -> Self {
        Self { max_threads }
    }

    pub const fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.max_threads)
    }

    pub const fn max_threads(&self) -> usize {
        self.max_threads
    }

    /// Check that `target` and every source share one 32-bit geometry and
    /// resolve `region` against it.
    pub fn validate(
        target: &PixelBufferMut<'_>,
        sources: &[PixelBuffer<'_>],
        region: Rect,
    ) -> Result<Rect> {
        if !target.format().is_packed_32() {
            return Err(FxError::unsupported(format!(
                "pixel format {} is not processed",
                target.format()
            )));
        }
        for (i, source) in sources.iter().enumerate() {
            if source.format().bytes_per_pixel() != target.format().bytes_per_pixel() {
                return Err(FxError::unsupported(format!(
                    "source {i} format {} differs from target format {}",
                    source.format(),
                    target.format()
                )));
            }
            if source.width() != target.width() || source.height() != target.height() {
                return Err(FxError::invalid(format!(
                    "source {i} is {}x{}, target is {}x{}",
                    source.width(),
                    source.height(),
                    target.width(),
                    target.height()
                )));
            }
        }
        region.resolve(target.bounds())
    }

    /// Call `kernel` once per scanline of `region`, in parallel bands.
    ///
    /// Returns only after every band is finished. A panic in any band is
    /// reported as [`FxError::Internal`] once all workers have joined.
    pub fn for_each_row<F>(
        &self,
        target: &mut PixelBufferMut<'_>,
        sources: &[PixelBuffer<'_>],
        region: Rect,
        kernel: F,
    ) -> Result<()>
    where
        F: Fn(Scanline<'_>) + Sync,
    {
        let region = Self::validate(target, sources, region)?;
        if region.is_empty() {
            return Ok(());
        }

        let bands = partition_rows(region.height, self.max_threads);
        tracing::debug!(
            "processing {}x{} at ({}, {}) in {} band(s)",
            region.width,
            region.height,
            region.x,
            region.y,
            bands.len()
        );

        let heights: Vec<u32> = bands.iter().map(|band| band.rows).collect();
        let views = target.crop_mut(region)?.split_rows(&heights);

        let run_band = |(band, mut view): (WorkPartition, PixelBufferMut<'_>)| {
            tracing::trace!("band rows {}..{}", band.first_row, band.first_row + band.rows);
            for row in 0..band.rows {
                kernel(Scanline {
                    y: region.y + band.first_row + row,
                    x: region.x,
                    pixels: view.row_mut(row),
                    sources,
                });
            }
        };

        self.fork_join(bands.into_iter().zip(views).collect(), run_band)
    }

    /// Apply a point kernel to every pixel of `region`, two pixels per
    /// step with a single trailing call for an odd last pixel.
    pub fn for_each_pixel<K>(
        &self,
        target: &mut PixelBufferMut<'_>,
        region: Rect,
        kernel: &K,
    ) -> Result<()>
    where
        K: PixelKernel + ?Sized,
    {
        self.for_each_row(target, &[], region, |line| {
            let mut pairs = line.pixels.chunks_exact_mut(2);
            for pair in &mut pairs {
                let out = kernel.pixel_pair([pair[0], pair[1]]);
                pair.copy_from_slice(&out);
            }
            if let [last] = pairs.into_remainder() {
                *last = kernel.pixel(*last);
            }
        })
    }

    /// Fill an engine-owned row-major scratch grid of `width` columns, one
    /// call per row, with the same banding as [`Self::for_each_row`].
    pub fn for_each_scratch_row<T, F>(
        &self,
        scratch: &mut [T],
        width: usize,
        kernel: F,
    ) -> Result<()>
    where
        T: Send,
        F: Fn(u32, &mut [T]) + Sync,
    {
        if width == 0 || scratch.is_empty() {
            return Ok(());
        }
        if scratch.len() % width != 0 {
            return Err(FxError::Internal(format!(
                "scratch of {} cells is not a whole number of {width}-wide rows",
                scratch.len()
            )));
        }
        let height = u32::try_from(scratch.len() / width)
            .map_err(|_| FxError::Internal("scratch is too tall".to_string()))?;

        let bands = partition_rows(height, self.max_threads);
        let mut jobs = Vec::with_capacity(bands.len());
        let mut rest = scratch;
        for band in bands {
            let (head, tail) =
                std::mem::take(&mut rest).split_at_mut(band.rows as usize * width);
            jobs.push((band, head));
            rest = tail;
        }

        self.fork_join(jobs, |(band, cells): (WorkPartition, &mut [T])| {
            for (row, line) in cells.chunks_exact_mut(width).enumerate() {
                kernel(band.first_row + row as u32, line);
            }
        })
    }

    /// Run the first job on the calling thread and the rest on a pool
    /// sized for this call.
    fn fork_join<T, F>(&self, jobs: Vec<T>, job_fn: F) -> Result<()>
    where
        T: Send,
        F: Fn(T) + Sync,
    {
        let mut jobs = jobs.into_iter();
        let Some(own) = jobs.next() else {
            return Ok(());
        };
        let rest: Vec<T> = jobs.collect();
        let job_fn = &job_fn;

        let outcome = if rest.is_empty() {
            panic::catch_unwind(AssertUnwindSafe(|| job_fn(own)))
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(rest.len())
                .thread_name(|i| format!("softfx-worker-{i}"))
                .build()
                .map_err(|e| FxError::Internal(format!("failed to start workers: {e}")))?;
            panic::catch_unwind(AssertUnwindSafe(|| {
                pool.in_place_scope(|scope| {
                    for job in rest {
                        scope.spawn(move |_| job_fn(job));
                    }
                    job_fn(own);
                })
            }))
        };

        outcome.map_err(|payload| {
            let msg = panic_message(payload.as_ref());
            tracing::warn!("pixel worker panicked: {msg}");
            FxError::Internal(format!("pixel worker panicked: {msg}"))
        })
    }
}

impl Default for PixelKernelProcessor {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::image::{Bitmap, PixelFormat};

    fn gradient(width: u32, height: u32) -> Bitmap {
        let mut bmp = Bitmap::new(width, height);
        for y in 0..height {
            for x in 0..width {
                bmp.set_pixel(x, y, Bgra::new(x as u8, y as u8, (x * y) as u8, 255));
            }
        }
        bmp
    }

    #[test]
    fn test_partition_covers_height_without_overlap() {
        for height in [1, 2, 7, 100, 101] {
            for threads in [0, 1, 2, 3, 8, 200] {
                let bands = partition_rows(height, threads);
                assert!(bands.len() <= threads + 1);
                assert!(bands.iter().all(|b| b.rows > 0));
                let mut next = 0;
                for band in &bands {
                    assert_eq!(band.first_row, next);
                    next += band.rows;
                }
                assert_eq!(next, height);
            }
        }
    }

    #[test]
    fn test_partition_spreads_remainder_over_leading_bands() {
        let rows: Vec<u32> = partition_rows(10, 3).iter().map(|b| b.rows).collect();
        assert_eq!(rows, vec![3, 3, 2, 2]);
        assert!(partition_rows(0, 4).is_empty());
    }

    #[test]
    fn test_partition_saturates_huge_thread_budget() {
        let bands = partition_rows(5, usize::MAX);
        assert_eq!(bands.len(), 5);
        assert!(bands.iter().all(|b| b.rows == 1));

        let mut bmp = gradient(4, 4);
        let invert_blue = PerPixel(|px: Bgra| Bgra::new(255 - px.b, px.g, px.r, px.a));
        PixelKernelProcessor::new(usize::MAX)
            .for_each_pixel(&mut bmp.as_buffer_mut(), Rect::default(), &invert_blue)
            .unwrap();
        assert_eq!(bmp.pixel(1, 0), Bgra::new(254, 0, 0, 255));
    }

    #[test]
    fn test_row_kernel_is_deterministic_across_thread_counts() {
        let reference = {
            let mut bmp = gradient(13, 17);
            PixelKernelProcessor::new(0)
                .for_each_row(&mut bmp.as_buffer_mut(), &[], Rect::default(), |line| {
                    for (i, px) in line.pixels.iter_mut().enumerate() {
                        px.r = px.r.wrapping_add((line.x as usize + i) as u8 ^ line.y as u8);
                    }
                })
                .unwrap();
            bmp
        };
        for threads in [1, 2, 8] {
            let mut bmp = gradient(13, 17);
            PixelKernelProcessor::new(threads)
                .for_each_row(&mut bmp.as_buffer_mut(), &[], Rect::default(), |line| {
                    for (i, px) in line.pixels.iter_mut().enumerate() {
                        px.r = px.r.wrapping_add((line.x as usize + i) as u8 ^ line.y as u8);
                    }
                })
                .unwrap();
            assert_eq!(bmp, reference, "threads = {threads}");
        }
    }

    #[test]
    fn test_pixel_kernel_visits_odd_width_exactly_once() {
        struct Counter(AtomicUsize, AtomicUsize);
        impl PixelKernel for Counter {
            fn pixel(&self, px: Bgra) -> Bgra {
                self.0.fetch_add(1, Ordering::Relaxed);
                Bgra::new(px.b.wrapping_add(1), px.g, px.r, px.a)
            }
            fn pixel_pair(&self, pair: [Bgra; 2]) -> [Bgra; 2] {
                self.1.fetch_add(1, Ordering::Relaxed);
                [self.pixel(pair[0]), self.pixel(pair[1])]
            }
        }

        let mut bmp = Bitmap::new(5, 3);
        let counter = Counter(AtomicUsize::new(0), AtomicUsize::new(0));
        PixelKernelProcessor::new(2)
            .for_each_pixel(&mut bmp.as_buffer_mut(), Rect::default(), &counter)
            .unwrap();
        assert_eq!(counter.0.load(Ordering::Relaxed), 15);
        assert_eq!(counter.1.load(Ordering::Relaxed), 6);
        assert!(bmp.pixels().iter().all(|px| px.b == 1));
    }

    #[test]
    fn test_region_limits_writes_and_padding_is_untouched() {
        let stride = 4 * 4 + 3;
        let mut data = vec![0xAAu8; stride * 4];
        {
            let mut buf = PixelBufferMut::bgra(&mut data, 4, 4, stride).unwrap();
            let clear = PerPixel(|_| Bgra::default());
            PixelKernelProcessor::new(3)
                .for_each_pixel(&mut buf, Rect::new(1, 1, 2, 2), &clear)
                .unwrap();
        }
        for y in 0..4 {
            for x in 0..stride {
                let inside = (1..3).contains(&y) && (4..12).contains(&x);
                let expected = if inside { 0 } else { 0xAA };
                assert_eq!(data[y * stride + x], expected, "byte ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_out_of_bounds_region_fails_before_mutation() {
        let mut bmp = gradient(4, 4);
        let before = bmp.clone();
        let err = PixelKernelProcessor::new(2)
            .for_each_pixel(
                &mut bmp.as_buffer_mut(),
                Rect::new(2, 2, 3, 3),
                &PerPixel(|_| Bgra::default()),
            )
            .unwrap_err();
        assert!(matches!(err, FxError::InvalidArgument(_)));
        assert_eq!(bmp, before);
    }

    #[test]
    fn test_mismatched_source_is_rejected() {
        let mut target = Bitmap::new(4, 4);
        let source = Bitmap::new(4, 5);
        let sources = [source.as_buffer()];
        let mut buf = target.as_buffer_mut();
        let err = PixelKernelProcessor::new(1)
            .for_each_row(&mut buf, &sources, Rect::default(), |_| {})
            .unwrap_err();
        assert!(matches!(err, FxError::InvalidArgument(_)));
    }

    #[test]
    fn test_non_32_bit_target_is_unsupported() {
        let mut data = vec![0u8; 12];
        let mut buf = PixelBufferMut::new(&mut data, 2, 2, 6, PixelFormat::Bgr24).unwrap();
        let err = PixelKernelProcessor::new(0)
            .for_each_row(&mut buf, &[], Rect::default(), |_| {})
            .unwrap_err();
        assert!(matches!(err, FxError::Unsupported(_)));
    }

    #[test]
    fn test_worker_panic_surfaces_after_join() {
        let mut bmp = gradient(8, 8);
        let finished = AtomicUsize::new(0);
        let err = PixelKernelProcessor::new(3)
            .for_each_row(&mut bmp.as_buffer_mut(), &[], Rect::default(), |line| {
                if line.y == 6 {
                    panic!("bad row");
                }
                finished.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap_err();
        assert!(matches!(err, FxError::Internal(_)));
        assert!(err.to_string().contains("bad row"));
        // Bands are rows 0-1, 2-3, 4-5, 6-7; the last band stops at its
        // first row and the other three all complete before the error.
        assert_eq!(finished.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_scratch_rows_are_filled_in_order() {
        let mut scratch = vec![0u32; 5 * 9];
        PixelKernelProcessor::new(4)
            .for_each_scratch_row(&mut scratch, 5, |y, line| {
                for (x, cell) in line.iter_mut().enumerate() {
                    *cell = y * 100 + x as u32;
                }
            })
            .unwrap();
        for (i, &cell) in scratch.iter().enumerate() {
            assert_eq!(cell, (i / 5) as u32 * 100 + (i % 5) as u32);
        }

        let mut ragged = vec![0u8; 7];
        let err = PixelKernelProcessor::new(1).for_each_scratch_row(&mut ragged, 3, |_, _| {});
        assert!(matches!(err, Err(FxError::Internal(_))));
    }

    #[test]
    fn test_sources_are_visible_to_row_kernel() {
        let source = gradient(6, 4);
        let mut target = Bitmap::new(6, 4);
        let sources = [source.as_buffer()];
        PixelKernelProcessor::new(2)
            .for_each_row(&mut target.as_buffer_mut(), &sources, Rect::default(), |line| {
                let src = line.sources[0].row(line.y);
                line.pixels.copy_from_slice(src);
            })
            .unwrap();
        assert_eq!(target, source);
    }
}
