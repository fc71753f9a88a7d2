//! Dispatch configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::ConfigError;

/// Rate-limit tuning for the dispatch queue.
///
/// 値はサーバーの本当の制限より保守的にしておきます:
/// - `allowed_requests_per_window` はサーバーの上限より少なく
/// - `evaluation_window_ms` はサーバーの窓より長く（時計・スケジューリングのずれを吸収）
///
/// JSON で読む場合、省略したフィールドはデフォルト値になります。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Max sends inside any trailing evaluation window (N).
    pub allowed_requests_per_window: usize,

    /// Length of the trailing window (W).
    pub evaluation_window_ms: u64,

    /// Wait after an explicit rate-limit rejection (C).
    pub cooldown_ms: u64,

    /// Delays at or below this are treated as "send now".
    pub delay_tolerance_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            allowed_requests_per_window: 19,
            evaluation_window_ms: 12_000,
            cooldown_ms: 15_000,
            delay_tolerance_ms: 100,
        }
    }
}

impl DispatchConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.allowed_requests_per_window == 0 {
            return Err(ConfigError::ZeroAllowedRequests);
        }
        if self.evaluation_window_ms == 0 {
            return Err(ConfigError::ZeroEvaluationWindow);
        }
        Ok(())
    }

    pub fn evaluation_window(&self) -> Duration {
        Duration::from_millis(self.evaluation_window_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn delay_tolerance(&self) -> Duration {
        Duration::from_millis(self.delay_tolerance_ms)
    }
}
