// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 16;

/// How a looper thread is set up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LooperConfig {
    /// Thread name, also used in log lines.
    pub name: String,
    /// Period of the ticker clock.
    pub frame_interval_ms: u64,
}

impl Default for LooperConfig {
    fn default() -> Self {
        Self {
            name: "home".to_string(),
            frame_interval_ms: DEFAULT_FRAME_INTERVAL_MS,
        }
    }
}

impl LooperConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.name.is_empty() {
            anyhow::bail!("looper name must not be empty");
        }
        if self.name.contains('\0') {
            anyhow::bail!("looper name must not contain NUL bytes");
        }
        if self.frame_interval_ms == 0 {
            anyhow::bail!("frame_interval_ms must be at least 1");
        }
        Ok(())
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_json() {
        let config = LooperConfig::from_json(r#"{"name":"ui"}"#).unwrap();
        assert_eq!(config.name, "ui");
        assert_eq!(config.frame_interval_ms, DEFAULT_FRAME_INTERVAL_MS);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(LooperConfig::from_json(r#"{"frame_interval_ms":0}"#).is_err());
        assert!(LooperConfig::from_json(r#"{"name":""}"#).is_err());
        assert!(LooperConfig::from_json(r#"{"colour":"blue"}"#).is_err());
        assert!(LooperConfig::from_json("not json").is_err());
    }

    #[test]
    fn round_trips_through_json() {
        let config = LooperConfig {
            name: "render".into(),
            frame_interval_ms: 8,
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(LooperConfig::from_json(&json).unwrap(), config);
    }
}
