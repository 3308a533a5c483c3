//! Application configuration.
//!
//! One YAML document covers every tunable of the core; every section is
//! optional and falls back to its crate's defaults. Resolution order:
//! explicit `--config` flag, `WEBRUNNER_CONFIG`, `./config/webrunner.yaml`,
//! then the platform config directory.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use error_recovery::RecoveryConfig;
use llm_router::RoutingConfig;
use selector_heal::HealerConfig;
use smart_wait::SmartWaitConfig;
use tool_executor::ToolExecutorConfig;
use webrunner_task_executor::TaskExecutorConfig;

pub const CONFIG_ENV_VAR: &str = "WEBRUNNER_CONFIG";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebRunnerConfig {
    pub tool_executor: ToolExecutorConfig,
    pub task_executor: TaskExecutorConfig,
    pub smart_wait: SmartWaitConfig,
    pub healing: HealerConfig,
    pub recovery: RecoveryConfig,
    pub routing: RoutingConfig,
}

pub struct LoadedConfig {
    pub config: WebRunnerConfig,
    pub path: PathBuf,
}

pub fn load_config(explicit: Option<&PathBuf>) -> Result<LoadedConfig> {
    let path = resolve_path(explicit)?;
    if path.exists() {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: WebRunnerConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        info!("Loaded configuration from: {}", path.display());
        Ok(LoadedConfig { config, path })
    } else {
        warn!("Config file not found, using defaults: {}", path.display());
        Ok(LoadedConfig {
            config: WebRunnerConfig::default(),
            path,
        })
    }
}

fn resolve_path(explicit: Option<&PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.clone());
    }
    if let Ok(from_env) = env::var(CONFIG_ENV_VAR) {
        if !from_env.trim().is_empty() {
            return Ok(PathBuf::from(from_env));
        }
    }
    let local = Path::new("config/webrunner.yaml");
    if local.exists() {
        return Ok(local.to_path_buf());
    }
    let mut path = dirs::config_dir().context("failed to resolve the config directory")?;
    path.push("webrunner");
    path.push("config.yaml");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_carries_documented_defaults() {
        let config = WebRunnerConfig::default();
        assert_eq!(config.tool_executor.max_attempts, 3);
        assert_eq!(config.tool_executor.base_backoff_ms, 500);
        assert_eq!(config.task_executor.pause_poll_interval_ms, 100);
        assert_eq!(config.smart_wait.default_timeout_ms, 10_000);
        assert_eq!(config.routing.circuit_breaker.failure_threshold, 5);
        assert!(config.routing.enable_fallback);
        assert_eq!(config.healing.min_confidence, 0.75);
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let yaml = r#"
tool_executor:
  max_attempts: 5
smart_wait:
  safety_multiplier: 2.0
"#;
        let config: WebRunnerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.tool_executor.max_attempts, 5);
        assert_eq!(config.tool_executor.base_backoff_ms, 500);
        assert_eq!(config.smart_wait.safety_multiplier, 2.0);
        assert_eq!(config.smart_wait.max_samples, 100);
    }

    #[test]
    fn full_round_trip_through_yaml() {
        let config = WebRunnerConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let back: WebRunnerConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.tool_executor.max_attempts, config.tool_executor.max_attempts);
        assert_eq!(back.recovery.strategy.max_retries, 3);
        assert_eq!(back.recovery.strategy.base_delay_ms, 1_000);
    }
}
