//! Configuration validation

use std::time::Duration;

use tracing::debug;

use crate::error::{ConfigError, Result};

use super::types::{ComplexityWeights, SchedulerConfig};

/// Validate configuration
pub fn validate_config(config: &SchedulerConfig) -> Result<()> {
    debug!("validating configuration");
    validate_workers(config)?;
    validate_timeout(config)?;
    validate_complexity(&config.complexity)?;
    validate_priority(config)?;
    debug!("configuration validation passed");
    Ok(())
}

fn validate_workers(config: &SchedulerConfig) -> Result<()> {
    if config.max_workers == Some(0) {
        return Err(ConfigError::invalid("max_workers", "must be greater than zero").into());
    }
    Ok(())
}

fn validate_timeout(config: &SchedulerConfig) -> Result<()> {
    let timeout = config.task_timeout_secs;
    if timeout <= 0.0 || Duration::try_from_secs_f64(timeout).is_err() {
        return Err(ConfigError::invalid(
            "task_timeout_secs",
            "must be a positive number of seconds that fits in a duration",
        )
        .into());
    }
    Ok(())
}

fn validate_complexity(weights: &ComplexityWeights) -> Result<()> {
    if !weights.base.is_finite() || weights.base <= 0.0 {
        return Err(ConfigError::invalid("complexity.base", "must be positive").into());
    }

    let named = [
        ("complexity.function", weights.function),
        ("complexity.class", weights.class),
        ("complexity.method", weights.method),
        ("complexity.property", weights.property),
        ("complexity.import", weights.import),
    ];
    for (field, weight) in named {
        if !weight.is_finite() || weight < 0.0 {
            return Err(ConfigError::invalid(field, "must be zero or positive").into());
        }
    }

    Ok(())
}

fn validate_priority(config: &SchedulerConfig) -> Result<()> {
    if !config.priority.scale.is_finite() || config.priority.scale < 0.0 {
        return Err(ConfigError::invalid("priority.scale", "must be zero or positive").into());
    }
    Ok(())
}
