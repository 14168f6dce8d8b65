//! Pixel buffer representation for the effect engine.
//!
//! Callers hand the engine a borrowed, strided byte buffer for the duration
//! of one call. [`PixelBuffer`] and [`PixelBufferMut`] validate the layout
//! once on construction; after that, rows are sliced out by index and cast
//! to [`Bgra`] pixels without copying.

use std::fmt;

use ::image::RgbaImage;
use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::error::{FxError, Result};

/// Pixel layouts a caller may describe.
///
/// Only the packed 32-bit layouts are processed. The others exist so a
/// caller can describe what it has and get a clear `Unsupported` back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit B, G, R, A, straight alpha.
    Bgra32,
    /// 8-bit B, G, R, A, premultiplied alpha.
    Pbgra32,
    /// 8-bit B, G, R without alpha.
    Bgr24,
    /// Single 8-bit gray channel.
    Gray8,
}

impl PixelFormat {
    /// Bytes occupied by one pixel.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Bgra32 | Self::Pbgra32 => 4,
            Self::Bgr24 => 3,
            Self::Gray8 => 1,
        }
    }

    /// Whether the engine can process this layout.
    pub const fn is_packed_32(self) -> bool {
        self.bytes_per_pixel() == 4
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bgra32 => write!(f, "32-bit BGRA"),
            Self::Pbgra32 => write!(f, "32-bit premultiplied BGRA"),
            Self::Bgr24 => write!(f, "24-bit BGR"),
            Self::Gray8 => write!(f, "8-bit gray"),
        }
    }
}

/// One packed 32-bit pixel in memory order.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
pub struct Bgra {
    pub b: u8,
    pub g: u8,
    pub r: u8,
    pub a: u8,
}

impl Bgra {
    pub const fn new(b: u8, g: u8, r: u8, a: u8) -> Self {
        Self { b, g, r, a }
    }

    /// Build a pixel from channels given in R, G, B, A order.
    pub const fn from_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { b, g, r, a }
    }

    pub const fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Pack two adjacent pixels into one little-endian 64-bit word.
    #[inline]
    pub fn pack_pair(pair: [Bgra; 2]) -> u64 {
        u64::from_le_bytes(bytemuck::cast(pair))
    }

    #[inline]
    pub fn unpack_pair(word: u64) -> [Bgra; 2] {
        bytemuck::cast(word.to_le_bytes())
    }
}

/// Axis-aligned pixel rectangle. An empty rectangle stands for "the whole
/// buffer" wherever a region of interest is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub const fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Exclusive right edge, widened so it cannot overflow.
    pub const fn right(&self) -> u64 {
        self.x as u64 + self.width as u64
    }

    /// Exclusive bottom edge, widened so it cannot overflow.
    pub const fn bottom(&self) -> u64 {
        self.y as u64 + self.height as u64
    }

    pub const fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Overlap of two rectangles, `None` when they do not overlap.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if x1 <= x0 as u64 || y1 <= y0 as u64 {
            return None;
        }
        let width = (x1 - x0 as u64) as u32;
        let height = (y1 - y0 as u64) as u32;
        Some(Rect::new(x0, y0, width, height))
    }

    /// Grow by `amount` on every side. `None` if the result would start at
    /// a negative coordinate or overflow.
    pub fn inflate(&self, amount: u32) -> Option<Rect> {
        let x = self.x.checked_sub(amount)?;
        let y = self.y.checked_sub(amount)?;
        let grow = amount.checked_mul(2)?;
        Some(Rect::new(
            x,
            y,
            self.width.checked_add(grow)?,
            self.height.checked_add(grow)?,
        ))
    }

    /// Resolve a caller region against a buffer: empty means the whole
    /// buffer, anything else must fit inside it.
    pub fn resolve(&self, bounds: Rect) -> Result<Rect> {
        if self.is_empty() {
            return Ok(bounds);
        }
        if !bounds.contains_rect(self) {
            return Err(FxError::invalid(format!(
                "region {self:?} exceeds buffer bounds {}x{}",
                bounds.width, bounds.height
            )));
        }
        Ok(*self)
    }
}

/// Bytes a buffer of the given geometry needs. The last row does not have
/// to carry stride padding.
fn required_bytes(width: u32, height: u32, stride: usize, format: PixelFormat) -> Result<usize> {
    let row_len = (width as usize)
        .checked_mul(format.bytes_per_pixel())
        .ok_or_else(|| FxError::invalid("buffer width overflows"))?;
    if stride < row_len {
        return Err(FxError::invalid(format!(
            "stride {stride} is smaller than row length {row_len}"
        )));
    }
    if width == 0 || height == 0 {
        return Ok(0);
    }
    (height as usize - 1)
        .checked_mul(stride)
        .and_then(|n| n.checked_add(row_len))
        .ok_or_else(|| FxError::invalid("buffer size overflows"))
}

/// Shared borrowed view of a pixel buffer.
#[derive(Clone, Copy)]
pub struct PixelBuffer<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    stride: usize,
    format: PixelFormat,
}

impl<'a> PixelBuffer<'a> {
    /// Wrap caller memory, checking stride and length.
    pub fn new(
        data: &'a [u8],
        width: u32,
        height: u32,
        stride: usize,
        format: PixelFormat,
    ) -> Result<Self> {
        let required = required_bytes(width, height, stride, format)?;
        if data.len() < required {
            return Err(FxError::invalid(format!(
                "buffer holds {} bytes, {width}x{height} with stride {stride} needs {required}",
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            stride,
            format,
        })
    }

    /// Wrap caller memory holding straight-alpha BGRA.
    pub fn bgra(data: &'a [u8], width: u32, height: u32, stride: usize) -> Result<Self> {
        Self::new(data, width, height, stride, PixelFormat::Bgra32)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_size(self.width, self.height)
    }

    /// Row `y` as pixels, padding excluded.
    ///
    /// # Panics
    ///
    /// Panics if `y` is out of range or the format is not 32-bit.
    #[inline]
    pub fn row(&self, y: u32) -> &'a [Bgra] {
        assert!(self.format.is_packed_32(), "row access needs a 32-bit format");
        assert!(y < self.height, "row {y} out of bounds (height {})", self.height);
        let data: &'a [u8] = self.data;
        let start = y as usize * self.stride;
        bytemuck::cast_slice(&data[start..start + self.width as usize * 4])
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> Bgra {
        self.row(y)[x as usize]
    }

    /// Zero-copy view of `rect`, sharing this buffer's stride.
    pub fn crop(&self, rect: Rect) -> Result<PixelBuffer<'a>> {
        if !self.bounds().contains_rect(&rect) {
            return Err(FxError::invalid(format!(
                "crop {rect:?} exceeds buffer bounds {}x{}",
                self.width, self.height
            )));
        }
        let bpp = self.format.bytes_per_pixel();
        let (start, end) = crop_span(rect, self.stride, bpp);
        let data: &'a [u8] = self.data;
        Ok(PixelBuffer {
            data: &data[start..end],
            width: rect.width,
            height: rect.height,
            stride: self.stride,
            format: self.format,
        })
    }
}

impl fmt::Debug for PixelBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PixelBuffer({}x{}, stride {}, {})",
            self.width, self.height, self.stride, self.format
        )
    }
}

fn crop_span(rect: Rect, stride: usize, bpp: usize) -> (usize, usize) {
    if rect.is_empty() {
        return (0, 0);
    }
    let start = rect.y as usize * stride + rect.x as usize * bpp;
    let end = (rect.y as usize + rect.height as usize - 1) * stride + rect.right() as usize * bpp;
    (start, end)
}

/// Exclusive borrowed view of a pixel buffer.
pub struct PixelBufferMut<'a> {
    data: &'a mut [u8],
    width: u32,
    height: u32,
    stride: usize,
    format: PixelFormat,
}

impl<'a> PixelBufferMut<'a> {
    pub fn new(
        data: &'a mut [u8],
        width: u32,
        height: u32,
        stride: usize,
        format: PixelFormat,
    ) -> Result<Self> {
        let required = required_bytes(width, height, stride, format)?;
        if data.len() < required {
            return Err(FxError::invalid(format!(
                "buffer holds {} bytes, {width}x{height} with stride {stride} needs {required}",
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            stride,
            format,
        })
    }

    pub fn bgra(data: &'a mut [u8], width: u32, height: u32, stride: usize) -> Result<Self> {
        Self::new(data, width, height, stride, PixelFormat::Bgra32)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_size(self.width, self.height)
    }

    /// Reborrow as a shared view.
    pub fn as_buffer(&self) -> PixelBuffer<'_> {
        PixelBuffer {
            data: &*self.data,
            width: self.width,
            height: self.height,
            stride: self.stride,
            format: self.format,
        }
    }

    /// Row `y` as mutable pixels, padding excluded.
    ///
    /// # Panics
    ///
    /// Panics if `y` is out of range or the format is not 32-bit.
    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [Bgra] {
        assert!(self.format.is_packed_32(), "row access needs a 32-bit format");
        assert!(y < self.height, "row {y} out of bounds (height {})", self.height);
        let start = y as usize * self.stride;
        bytemuck::cast_slice_mut(&mut self.data[start..start + self.width as usize * 4])
    }

    /// Zero-copy mutable view of `rect`.
    pub fn crop_mut(&mut self, rect: Rect) -> Result<PixelBufferMut<'_>> {
        if !self.bounds().contains_rect(&rect) {
            return Err(FxError::invalid(format!(
                "crop {rect:?} exceeds buffer bounds {}x{}",
                self.width, self.height
            )));
        }
        let bpp = self.format.bytes_per_pixel();
        let (start, end) = crop_span(rect, self.stride, bpp);
        Ok(PixelBufferMut {
            data: &mut self.data[start..end],
            width: rect.width,
            height: rect.height,
            stride: self.stride,
            format: self.format,
        })
    }

    /// Split into consecutive row bands of the given heights. The heights
    /// must sum to this view's height.
    pub(crate) fn split_rows(self, heights: &[u32]) -> Vec<PixelBufferMut<'a>> {
        debug_assert_eq!(
            heights.iter().map(|&h| h as u64).sum::<u64>(),
            self.height as u64
        );
        let mut bands = Vec::with_capacity(heights.len());
        let mut rest: &'a mut [u8] = self.data;
        for (i, &rows) in heights.iter().enumerate() {
            let band_data = if i + 1 == heights.len() {
                std::mem::take(&mut rest)
            } else {
                let (head, tail) =
                    std::mem::take(&mut rest).split_at_mut(rows as usize * self.stride);
                rest = tail;
                head
            };
            bands.push(PixelBufferMut {
                data: band_data,
                width: self.width,
                height: rows,
                stride: self.stride,
                format: self.format,
            });
        }
        bands
    }
}

impl fmt::Debug for PixelBufferMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PixelBufferMut({}x{}, stride {}, {})",
            self.width, self.height, self.stride, self.format
        )
    }
}

/// Owned, tightly packed BGRA image.
///
/// Used for engine scratch space and by callers that want a new bitmap back
/// instead of mutating their own memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Bitmap {
    /// Transparent black bitmap.
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, Bgra::default())
    }

    pub fn filled(width: u32, height: u32, color: Bgra) -> Self {
        let count = width as usize * height as usize;
        let mut data = vec![0u8; count * 4];
        bytemuck::cast_slice_mut::<u8, Bgra>(&mut data).fill(color);
        Self {
            width,
            height,
            data,
        }
    }

    /// Build from pixels in row-major order.
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<Bgra>) -> Result<Self> {
        if pixels.len() != width as usize * height as usize {
            return Err(FxError::invalid(format!(
                "{} pixels cannot fill a {width}x{height} bitmap",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data: bytemuck::cast_slice(&pixels).to_vec(),
        })
    }

    pub fn from_rgba_image(img: &RgbaImage) -> Self {
        let mut data = Vec::with_capacity(img.width() as usize * img.height() as usize * 4);
        for px in img.pixels() {
            let [r, g, b, a] = px.0;
            data.extend_from_slice(&[b, g, r, a]);
        }
        Self {
            width: img.width(),
            height: img.height(),
            data,
        }
    }

    pub fn to_rgba_image(&self) -> RgbaImage {
        RgbaImage::from_fn(self.width, self.height, |x, y| {
            ::image::Rgba(self.pixel(x, y).to_rgba())
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.width as usize * 4
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_size(self.width, self.height)
    }

    pub fn pixels(&self) -> &[Bgra] {
        bytemuck::cast_slice(&self.data)
    }

    pub fn pixels_mut(&mut self) -> &mut [Bgra] {
        bytemuck::cast_slice_mut(&mut self.data)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> Bgra {
        self.pixels()[y as usize * self.width as usize + x as usize]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: Bgra) {
        let width = self.width as usize;
        self.pixels_mut()[y as usize * width + x as usize] = color;
    }

    pub fn as_buffer(&self) -> PixelBuffer<'_> {
        PixelBuffer {
            data: &self.data,
            width: self.width,
            height: self.height,
            stride: self.stride(),
            format: PixelFormat::Bgra32,
        }
    }

    pub fn as_buffer_mut(&mut self) -> PixelBufferMut<'_> {
        let stride = self.stride();
        PixelBufferMut {
            data: &mut self.data,
            width: self.width,
            height: self.height,
            stride,
            format: PixelFormat::Bgra32,
        }
    }

    /// Copy of this bitmap centered in a transparent border `border` pixels
    /// wide on every side.
    pub fn expanded(&self, border: u32) -> Result<Bitmap> {
        let grow = border
            .checked_mul(2)
            .ok_or_else(|| FxError::invalid("border overflows"))?;
        let width = self
            .width
            .checked_add(grow)
            .ok_or_else(|| FxError::invalid("expanded width overflows"))?;
        let height = self
            .height
            .checked_add(grow)
            .ok_or_else(|| FxError::invalid("expanded height overflows"))?;
        let mut out = Bitmap::new(width, height);
        let src_width = self.width as usize;
        for y in 0..self.height {
            let src = &self.pixels()[y as usize * src_width..(y as usize + 1) * src_width];
            let start = (y + border) as usize * width as usize + border as usize;
            out.pixels_mut()[start..start + src_width].copy_from_slice(src);
        }
        Ok(out)
    }
}
