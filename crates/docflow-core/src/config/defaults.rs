//! Default configuration values

use super::types::SchedulerConfig;

/// Default configuration file name (TOML)
pub const DEFAULT_CONFIG_TOML: &str = "docflow.toml";

/// Default configuration file name (YAML)
pub const DEFAULT_CONFIG_YAML: &str = "docflow.yaml";

/// Upper bound on the hardware-derived worker count
pub const MAX_DEFAULT_WORKERS: usize = 32;

/// Get list of config file names to search for, in priority order
pub fn config_file_names() -> Vec<&'static str> {
    vec![
        DEFAULT_CONFIG_TOML,
        DEFAULT_CONFIG_YAML,
        ".docflow.toml",
        ".docflow.yaml",
    ]
}

/// Default worker count: `min(32, cores + 4)`
pub fn default_max_workers() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cores + 4).min(MAX_DEFAULT_WORKERS)
}

/// Generate default configuration TOML
pub fn default_config_toml() -> String {
    let config = SchedulerConfig::default();
    toml::to_string_pretty(&config).unwrap_or_else(|_| DEFAULT_CONFIG_TEMPLATE.to_string())
}

/// Default configuration template
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# docflow configuration

strategy = "shared"
task_timeout_secs = 300.0
failure_policy = "run_dependents"
duplicate_policy = "replace"

[complexity]
base = 1.0
function = 0.1
class = 0.2
method = 0.05
property = 0.03
import = 0.02

[priority]
ceiling = 100
scale = 10.0
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_max_workers_bounds() {
        let workers = default_max_workers();
        assert!(workers >= 5);
        assert!(workers <= MAX_DEFAULT_WORKERS);
    }

    #[test]
    fn test_template_parses_to_defaults() {
        let config: SchedulerConfig = toml::from_str(DEFAULT_CONFIG_TEMPLATE).unwrap();
        assert_eq!(config, SchedulerConfig::default());
    }

    #[test]
    fn test_default_config_toml_roundtrips() {
        let rendered = default_config_toml();
        let config: SchedulerConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(config, SchedulerConfig::default());
    }
}
