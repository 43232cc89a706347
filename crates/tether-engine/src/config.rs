//! Bridge configuration, validation, and error types.
//!
//! [`BridgeConfig`] is the input for constructing a
//! [`PhysicsBridge`](crate::PhysicsBridge). [`validate()`](BridgeConfig::validate)
//! checks structural invariants at startup; the bridge constructor calls it
//! before building anything.

use serde::Deserialize;
use thiserror::Error;

// ── CommitPolicy ───────────────────────────────────────────────────

/// When the staging queue is drained.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitPolicy {
    /// Commit once per tick, after every realm has stepped.
    #[default]
    EveryTick,
    /// Commit only when the host asks, between ticks.
    OnRequest,
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected during [`BridgeConfig::validate()`] or parsing.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A gravity component is NaN or infinite.
    #[error("gravity must be finite, got {value:?}")]
    InvalidGravity {
        /// The invalid vector.
        value: [f32; 3],
    },
    /// tick_rate_hz is NaN, infinite, zero, or negative.
    #[error("tick_rate_hz must be finite and positive, got {value}")]
    InvalidTickRate {
        /// The invalid value.
        value: f64,
    },
    /// max_step_secs is NaN, infinite, zero, or negative.
    #[error("max_step_secs must be finite and positive, got {value}")]
    InvalidMaxStep {
        /// The invalid value.
        value: f32,
    },
    /// Control queue capacity is zero.
    #[error("control_queue_capacity must be at least 1")]
    ControlQueueZero,
    /// The TOML document could not be parsed.
    #[error("config parse: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── BridgeConfig ───────────────────────────────────────────────────

/// Complete configuration for a physics bridge.
///
/// Every field has a default, so a TOML document only needs to name
/// the values it overrides.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// World gravity for every realm context. Default: `[0, -9.81, 0]`.
    pub gravity: [f32; 3],
    /// Target tick rate for the loop thread. `None` = unthrottled.
    pub tick_rate_hz: Option<f64>,
    /// When staged mutations are committed. Default: every tick.
    pub commit_policy: CommitPolicy,
    /// Upper clamp on the elapsed seconds handed to a step.
    pub max_step_secs: Option<f32>,
    /// Bound of the host→loop control channel. Default: 1024.
    pub control_queue_capacity: usize,
    /// Scan post-step body state for NaN/inf. Default: true.
    pub check_finite: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            gravity: [0.0, -9.81, 0.0],
            tick_rate_hz: None,
            commit_policy: CommitPolicy::EveryTick,
            max_step_secs: None,
            control_queue_capacity: 1024,
            check_finite: true,
        }
    }
}

impl BridgeConfig {
    /// Parse a TOML document and validate it.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.gravity.iter().all(|g| g.is_finite()) {
            return Err(ConfigError::InvalidGravity {
                value: self.gravity,
            });
        }
        // The reciprocal must also be finite: Duration::from_secs_f64
        // panics on inf.
        if let Some(hz) = self.tick_rate_hz {
            if !hz.is_finite() || hz <= 0.0 || !(1.0 / hz).is_finite() {
                return Err(ConfigError::InvalidTickRate { value: hz });
            }
        }
        if let Some(max) = self.max_step_secs {
            if !max.is_finite() || max <= 0.0 {
                return Err(ConfigError::InvalidMaxStep { value: max });
            }
        }
        if self.control_queue_capacity == 0 {
            return Err(ConfigError::ControlQueueZero);
        }
        Ok(())
    }

    /// Apply `max_step_secs` to a measured delta.
    pub(crate) fn clamp_step(&self, elapsed: f32) -> f32 {
        match self.max_step_secs {
            Some(max) => elapsed.min(max),
            None => elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let c = BridgeConfig::default();
        assert!(c.validate().is_ok());
        assert_eq!(c.commit_policy, CommitPolicy::EveryTick);
        assert_eq!(c.control_queue_capacity, 1024);
    }

    #[test]
    fn nan_gravity_rejected() {
        let c = BridgeConfig {
            gravity: [0.0, f32::NAN, 0.0],
            ..BridgeConfig::default()
        };
        assert!(matches!(c.validate(), Err(ConfigError::InvalidGravity { .. })));
    }

    #[test]
    fn tick_rate_rejections() {
        for hz in [0.0, -1.0, f64::NAN, f64::INFINITY, 1e-310] {
            let c = BridgeConfig {
                tick_rate_hz: Some(hz),
                ..BridgeConfig::default()
            };
            assert!(
                matches!(c.validate(), Err(ConfigError::InvalidTickRate { .. })),
                "{hz} should be rejected"
            );
        }
    }

    #[test]
    fn zero_queue_rejected() {
        let c = BridgeConfig {
            control_queue_capacity: 0,
            ..BridgeConfig::default()
        };
        assert!(matches!(c.validate(), Err(ConfigError::ControlQueueZero)));
    }

    #[test]
    fn clamp_step_applies_max() {
        let c = BridgeConfig {
            max_step_secs: Some(0.05),
            ..BridgeConfig::default()
        };
        assert_eq!(c.clamp_step(0.5), 0.05);
        assert_eq!(c.clamp_step(0.01), 0.01);
        assert_eq!(BridgeConfig::default().clamp_step(3.0), 3.0);
    }

    #[test]
    fn toml_overrides_only_named_fields() {
        let c = BridgeConfig::from_toml_str(
            r#"
            tick_rate_hz = 60.0
            commit_policy = "on_request"
            "#,
        )
        .unwrap();
        assert_eq!(c.tick_rate_hz, Some(60.0));
        assert_eq!(c.commit_policy, CommitPolicy::OnRequest);
        assert_eq!(c.gravity, [0.0, -9.81, 0.0]);
        assert!(c.check_finite);
    }

    #[test]
    fn toml_invalid_value_fails_validation() {
        let err = BridgeConfig::from_toml_str("max_step_secs = -1.0").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidMaxStep { .. }));
    }

    #[test]
    fn toml_unknown_key_is_parse_error() {
        let err = BridgeConfig::from_toml_str("tick_rate = 5").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().starts_with("config parse:"));
    }
}
