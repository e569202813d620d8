//! Exit codes for the CLI

use docflow_core::{ConfigError, DocflowError};
use docflow_tasks::{GraphError, SchedulerError};

/// Success
pub const SUCCESS: u8 = 0;

/// General error, including failed tasks
pub const ERROR: u8 = 1;

/// Configuration error
pub const CONFIG_ERROR: u8 = 2;

/// Task graph cannot be scheduled (cycle, missing dependency, duplicate id)
pub const GRAPH_ERROR: u8 = 3;

/// Map an error to the exit code it should produce
pub fn for_error(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if cause.is::<ConfigError>() || cause.is::<DocflowError>() {
            return CONFIG_ERROR;
        }
        if cause.is::<GraphError>() || cause.is::<SchedulerError>() {
            return GRAPH_ERROR;
        }
    }
    ERROR
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_config_error_code() {
        let err = anyhow::Error::new(ConfigError::invalid("max_workers", "must be at least 1"));
        assert_eq!(for_error(&err), CONFIG_ERROR);

        let wrapped = Err::<(), _>(DocflowError::Config(ConfigError::invalid("x", "y")))
            .context("loading docflow.toml")
            .unwrap_err();
        assert_eq!(for_error(&wrapped), CONFIG_ERROR);
    }

    #[test]
    fn test_graph_error_code() {
        let err = anyhow::Error::new(GraphError::DuplicateTask("a".to_string()));
        assert_eq!(for_error(&err), GRAPH_ERROR);
    }

    #[test]
    fn test_generic_error_code() {
        assert_eq!(for_error(&anyhow::anyhow!("2 tasks failed")), ERROR);
    }
}
