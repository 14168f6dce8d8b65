//! Separable convolutions: blur and sharpen.
//!
//! Both effects run a horizontal pass into engine-owned scratch memory and
//! then a vertical pass back into the caller's buffer. The passes are
//! sequential; each one is split across threads by the processor.

pub mod blur;
pub mod kernel;
pub mod sharpen;

pub use blur::{apply_blur, blur_with_kernel};
pub use kernel::{BlurKernel, MAX_RADIUS, SharpenKernel};
pub use sharpen::{MID_GRAY, apply_sharpen, sharpen_with_kernel};
