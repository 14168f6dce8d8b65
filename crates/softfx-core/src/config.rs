//! Engine-wide configuration.

use serde::{Deserialize, Serialize};

/// Knobs shared by every effect call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Worker threads spawned per call in addition to the calling thread.
    /// `0` runs everything on the caller.
    #[serde(default = "EngineConfig::default_max_threads")]
    pub max_threads: usize,
}

impl EngineConfig {
    /// Single-threaded configuration.
    pub const fn serial() -> Self {
        Self { max_threads: 0 }
    }

    pub const fn with_max_threads(max_threads: usize) -> Self {
        Self { max_threads }
    }

    /// One worker per available core, minus the caller's own thread.
    fn default_max_threads() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get().saturating_sub(1))
            .unwrap_or(0)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_threads: Self::default_max_threads(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_thread_count_uses_default() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_explicit_thread_count_is_kept() {
        let config: EngineConfig = serde_json::from_str(r#"{"max_threads": 3}"#).unwrap();
        assert_eq!(config.max_threads, 3);
        assert_eq!(EngineConfig::serial().max_threads, 0);
    }
}
