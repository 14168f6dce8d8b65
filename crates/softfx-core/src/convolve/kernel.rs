//! Fixed-point 1-D kernels shared by the blur and sharpen passes.
//!
//! Weights are stored in 8.8 fixed point (1.0 == 256). Each tap carries a
//! 256-entry product table so the inner loops add instead of multiply.

use crate::error::{FxError, Result};

/// Largest accepted radius.
pub const MAX_RADIUS: f64 = 255.0;

/// Fixed-point scale of kernel weights.
pub const WEIGHT_ONE: u32 = 256;

pub fn validate_radius(radius: f64) -> Result<()> {
    if !radius.is_finite() || !(0.0..=MAX_RADIUS).contains(&radius) {
        return Err(FxError::invalid(format!(
            "radius {radius} is outside 0..={MAX_RADIUS}"
        )));
    }
    Ok(())
}

/// Symmetric blur kernel. Tap `k` (0 is the center) weighs `1 + radius - k`;
/// for a fractional radius the outermost tap keeps only the fractional part.
#[derive(Debug, Clone, PartialEq)]
pub struct BlurKernel {
    radius: f64,
    weights: Vec<u32>,
    products: Vec<[u32; 256]>,
}

impl BlurKernel {
    pub fn new(radius: f64) -> Result<Self> {
        validate_radius(radius)?;
        let reach = radius.ceil() as usize;
        let weights: Vec<u32> = (0..=reach)
            .map(|k| {
                let w = if k == reach && k > 0 && radius.fract() > 0.0 {
                    radius.fract()
                } else {
                    1.0 + radius - k as f64
                };
                (w * WEIGHT_ONE as f64).round() as u32
            })
            .collect();
        let products = weights
            .iter()
            .map(|&w| {
                let mut table = [0u32; 256];
                for (v, out) in table.iter_mut().enumerate() {
                    *out = w * v as u32;
                }
                table
            })
            .collect();
        Ok(Self {
            radius,
            weights,
            products,
        })
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Taps on each side of the center, `ceil(radius)`.
    pub fn reach(&self) -> u32 {
        (self.weights.len() - 1) as u32
    }

    pub fn is_identity(&self) -> bool {
        self.reach() == 0
    }

    /// Fixed-point weight of the tap `offset` pixels from the center.
    #[inline]
    pub fn weight(&self, offset: u32) -> u32 {
        self.weights[offset as usize]
    }

    pub fn weights(&self) -> &[u32] {
        &self.weights
    }

    /// `weight(offset) * value` from the product table.
    #[inline]
    pub fn product(&self, offset: u32, value: u8) -> u32 {
        self.products[offset as usize][value as usize]
    }

    pub fn center(&self) -> u32 {
        self.weights[0]
    }

    /// Sum of every tap on both sides, center included.
    pub fn total_weight(&self) -> u64 {
        let sides: u64 = self.weights[1..].iter().map(|&w| w as u64).sum();
        self.center() as u64 + 2 * sides
    }
}

/// Sharpening kernel derived from a blur kernel: off-center taps are the
/// negated blur weights and the center is the blur's total weight, so the
/// taps sum to the blur's center weight.
#[derive(Debug, Clone, PartialEq)]
pub struct SharpenKernel {
    blur: BlurKernel,
    center: i64,
}

impl SharpenKernel {
    pub fn new(radius: f64) -> Result<Self> {
        let blur = BlurKernel::new(radius)?;
        let center = blur.total_weight() as i64;
        Ok(Self { blur, center })
    }

    pub fn radius(&self) -> f64 {
        self.blur.radius()
    }

    pub fn reach(&self) -> u32 {
        self.blur.reach()
    }

    pub fn center(&self) -> i64 {
        self.center
    }

    /// Magnitude of the (negative) tap `offset >= 1` pixels from the center.
    #[inline]
    pub fn side(&self, offset: u32) -> i64 {
        self.blur.weight(offset) as i64
    }

    #[inline]
    pub fn side_product(&self, offset: u32, value: u8) -> i64 {
        self.blur.product(offset, value) as i64
    }

    /// Sum of all taps. A flat field scaled by this comes out unchanged.
    pub fn gain(&self) -> i64 {
        self.blur.center() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_radius_weights() {
        let kernel = BlurKernel::new(2.0).unwrap();
        assert_eq!(kernel.weights(), &[768, 512, 256]);
        assert_eq!(kernel.reach(), 2);
        assert_eq!(kernel.total_weight(), 768 + 2 * (512 + 256));
    }

    #[test]
    fn test_fractional_radius_outer_tap() {
        let kernel = BlurKernel::new(1.5).unwrap();
        // center 2.5, tap 1 -> 1.5, outer tap keeps 0.5
        assert_eq!(kernel.weights(), &[640, 384, 128]);
    }

    #[test]
    fn test_zero_radius_is_single_tap() {
        let kernel = BlurKernel::new(0.0).unwrap();
        assert!(kernel.is_identity());
        assert_eq!(kernel.weights(), &[WEIGHT_ONE]);
    }

    #[test]
    fn test_product_table_matches_multiply() {
        let kernel = BlurKernel::new(3.25).unwrap();
        for offset in 0..=kernel.reach() {
            for v in [0u8, 1, 127, 255] {
                assert_eq!(kernel.product(offset, v), kernel.weight(offset) * v as u32);
            }
        }
    }

    #[test]
    fn test_radius_domain() {
        assert!(BlurKernel::new(-0.1).is_err());
        assert!(BlurKernel::new(255.5).is_err());
        assert!(BlurKernel::new(f64::NAN).is_err());
        assert!(BlurKernel::new(f64::INFINITY).is_err());
        assert_eq!(BlurKernel::new(255.0).unwrap().reach(), 255);
    }

    #[test]
    fn test_sharpen_taps_sum_to_blur_center() {
        let kernel = SharpenKernel::new(2.5).unwrap();
        let sides: i64 = (1..=kernel.reach()).map(|k| 2 * kernel.side(k)).sum();
        assert_eq!(kernel.center() - sides, kernel.gain());
        assert_eq!(kernel.gain(), 896);
    }
}
