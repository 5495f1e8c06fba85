use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for Stepflow
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StepflowConfig {
    /// Snapshot persistence settings
    pub persistence: PersistenceConfig,
    /// Workflow machine settings
    pub workflow: WorkflowConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PersistenceConfig {
    /// Enable snapshot persistence (disabled means memory-only sessions)
    pub enable_persistence: bool,
    /// Directory holding one state file per workflow key
    pub state_directory: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowConfig {
    /// Cap on the in-memory transition history kept per machine session
    pub max_transition_history: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Enable structured tracing output
    pub tracing_enabled: bool,
    /// Log level
    pub log_level: String,
}

impl Default for StepflowConfig {
    fn default() -> Self {
        Self {
            persistence: PersistenceConfig {
                enable_persistence: true,
                state_directory: ".stepflow/state".to_string(),
            },
            workflow: WorkflowConfig {
                max_transition_history: 256,
            },
            observability: ObservabilityConfig {
                tracing_enabled: true,
                log_level: "info".to_string(),
            },
        }
    }
}

impl StepflowConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (stepflow.toml)
    /// 3. Environment variables (prefixed with STEPFLOW_)
    pub fn load() -> Result<Self> {
        let defaults = Self::default();

        let mut builder = Config::builder()
            .set_default(
                "persistence.enable_persistence",
                defaults.persistence.enable_persistence,
            )?
            .set_default(
                "persistence.state_directory",
                defaults.persistence.state_directory,
            )?
            .set_default(
                "workflow.max_transition_history",
                defaults.workflow.max_transition_history as u64,
            )?
            .set_default(
                "observability.tracing_enabled",
                defaults.observability.tracing_enabled,
            )?
            .set_default("observability.log_level", defaults.observability.log_level)?;

        if Path::new("stepflow.toml").exists() {
            builder = builder.add_source(File::with_name("stepflow"));
        }

        builder = builder.add_source(
            Environment::with_prefix("STEPFLOW")
                .separator("_")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<StepflowConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        // Load .env file first
        let _ = StepflowConfig::load_env_file();
        StepflowConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static StepflowConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = StepflowConfig::default();

        assert!(config.persistence.enable_persistence);
        assert_eq!(config.persistence.state_directory, ".stepflow/state");
        assert_eq!(config.workflow.max_transition_history, 256);
    }

    #[test]
    fn save_round_trips_through_toml() {
        let config = StepflowConfig::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let restored: StepflowConfig = toml::from_str(&serialized).unwrap();

        assert_eq!(
            restored.workflow.max_transition_history,
            config.workflow.max_transition_history
        );
        assert_eq!(
            restored.persistence.state_directory,
            config.persistence.state_directory
        );
    }
}
