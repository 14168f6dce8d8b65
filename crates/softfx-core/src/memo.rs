//! Recompute-on-change cache for tables derived from effect parameters.

use crate::error::Result;

/// Remembers the last parameters a value was built from and rebuilds only
/// when different parameters arrive.
#[derive(Debug, Clone)]
pub struct Memo<P, T> {
    entry: Option<(P, T)>,
}

impl<P, T> Default for Memo<P, T> {
    fn default() -> Self {
        Self { entry: None }
    }
}

impl<P: PartialEq + Clone, T> Memo<P, T> {
    /// Cached value for `params`, calling `build` first on a miss. A failed
    /// build leaves the previous entry in place.
    pub fn get_or_build(&mut self, params: &P, build: impl FnOnce(&P) -> Result<T>) -> Result<&T> {
        let entry = match self.entry.take() {
            Some((cached, value)) if cached == *params => (cached, value),
            previous => match build(params) {
                Ok(value) => (params.clone(), value),
                Err(err) => {
                    self.entry = previous;
                    return Err(err);
                }
            },
        };
        let (_, value) = self.entry.insert(entry);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::error::FxError;

    #[test]
    fn test_rebuilds_only_on_change() {
        let builds = Cell::new(0);
        let mut memo: Memo<i32, i32> = Memo::default();
        let build = |p: &i32| {
            builds.set(builds.get() + 1);
            Ok(p * 10)
        };
        assert_eq!(*memo.get_or_build(&3, build).unwrap(), 30);
        assert_eq!(*memo.get_or_build(&3, build).unwrap(), 30);
        assert_eq!(builds.get(), 1);
        assert_eq!(*memo.get_or_build(&4, build).unwrap(), 40);
        assert_eq!(builds.get(), 2);
    }

    #[test]
    fn test_failed_build_keeps_previous_entry() {
        let mut memo: Memo<i32, i32> = Memo::default();
        memo.get_or_build(&1, |p| Ok(*p)).unwrap();
        let err = memo.get_or_build(&2, |_| Err(FxError::invalid("nope")));
        assert!(err.is_err());
        // the old entry still answers without a rebuild
        let cached = memo.get_or_build(&1, |_| Err(FxError::invalid("rebuilt")));
        assert_eq!(*cached.unwrap(), 1);
    }
}
