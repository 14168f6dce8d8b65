//! Error type shared by every effect entry point.

/// Failure reported by an effect or by the pixel processor.
///
/// Validation errors are always returned before any worker thread starts,
/// so an `Err` from validation never leaves a partially processed buffer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FxError {
    /// Mismatched or malformed buffers, a region outside the buffer, or an
    /// effect parameter outside its valid range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The effect cannot handle the buffer's pixel format.
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// Worker creation failed or a worker panicked.
    #[error("internal error: {0}")]
    Internal(String),
}

impl FxError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FxError>;

/// Reject a parameter that is outside `min..=max` (or NaN).
pub(crate) fn check_range<T>(name: &str, value: T, min: T, max: T) -> Result<()>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(FxError::invalid(format!(
            "{name} = {value} is outside [{min}, {max}]"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_range_accepts_bounds() {
        assert!(check_range("amount", 0, 0, 100).is_ok());
        assert!(check_range("amount", 100, 0, 100).is_ok());
    }

    #[test]
    fn test_check_range_rejects_nan_and_overflow() {
        assert!(check_range("radius", f32::NAN, 0.0, 255.0).is_err());
        let err = check_range("radius", 256.0_f32, 0.0, 255.0).unwrap_err();
        assert!(matches!(err, FxError::InvalidArgument(_)));
        assert!(err.to_string().contains("radius"));
    }
}
