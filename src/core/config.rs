// ============================================================================
// spark-fiber - Runtime Configuration
// Tunables for the work loop, loop guards and microtask draining
// ============================================================================

use std::time::Duration;

use serde::Deserialize;

use super::constants::MAX_FLUSH_COUNT;
use super::error::{RenderError, Result};
use crate::scheduler::deadline::TimeSlice;

/// Per-root runtime settings.
///
/// Missing fields fall back to [`RuntimeConfig::default`], so a partial TOML
/// table is enough:
///
/// ```
/// use spark_fiber::RuntimeConfig;
///
/// let config = RuntimeConfig::from_toml_str("time_slice_ms = 8").unwrap();
/// assert_eq!(config.time_slice_ms, 8);
/// assert_eq!(config.max_rerenders, 25);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Length of a cooperative time slice handed out by `deadline()`
    pub time_slice_ms: u64,

    /// Render-phase updates allowed for one component within a single pass
    pub max_rerenders: u32,

    /// Microtask drain iterations before the queue is abandoned
    pub max_microtask_iterations: u32,

    /// Work + commit passes `flush_sync` runs before reporting a loop
    pub max_commit_passes: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            time_slice_ms: 5,
            max_rerenders: 25,
            max_microtask_iterations: MAX_FLUSH_COUNT,
            max_commit_passes: 50,
        }
    }
}

impl RuntimeConfig {
    /// Parse a config from a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source).map_err(|e| RenderError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would stall every pass.
    pub fn validate(&self) -> Result<()> {
        if self.max_rerenders == 0 {
            return Err(RenderError::Config("max_rerenders must be at least 1".into()));
        }
        if self.max_commit_passes == 0 {
            return Err(RenderError::Config("max_commit_passes must be at least 1".into()));
        }
        Ok(())
    }

    /// Slice length as a `Duration`
    pub fn time_slice(&self) -> Duration {
        Duration::from_millis(self.time_slice_ms)
    }

    /// A fresh time-slice deadline starting now
    pub fn deadline(&self) -> TimeSlice {
        TimeSlice::new(self.time_slice())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.time_slice(), Duration::from_millis(5));
        assert_eq!(config.max_microtask_iterations, MAX_FLUSH_COUNT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_full_table() {
        let config = RuntimeConfig::from_toml_str(
            r#"
            time_slice_ms = 16
            max_rerenders = 10
            max_microtask_iterations = 50
            max_commit_passes = 4
            "#,
        )
        .unwrap();

        assert_eq!(
            config,
            RuntimeConfig {
                time_slice_ms: 16,
                max_rerenders: 10,
                max_microtask_iterations: 50,
                max_commit_passes: 4,
            }
        );
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            RuntimeConfig::from_toml_str("max_rerenders = 0"),
            Err(RenderError::Config(_))
        ));
        assert!(matches!(
            RuntimeConfig::from_toml_str("time_slice_ms = \"fast\""),
            Err(RenderError::Config(_))
        ));
    }
}
