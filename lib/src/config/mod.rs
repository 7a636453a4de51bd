// lib/src/config/mod.rs

pub mod config_defaults;
pub mod config_structs;

pub use config_defaults::{DEFAULT_CONFIG_FILE, DEFAULT_DATA_DIRECTORY, DEFAULT_REST_API_PORT};
pub use config_structs::{
    AppConfig, BillingConfig, LoggingConfig, SecurityConfig, ServerConfig, StorageConfig, StorageEngineType,
};

use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use models::{HospitalError, HospitalResult};
use tracing::debug;

impl AppConfig {
    /// Loads defaults, then the YAML file at `path` (or `config/hms.yaml`
    /// when present), then `HMS__SECTION__KEY` environment variables.
    pub fn load(path: Option<&Path>) -> HospitalResult<Self> {
        let mut builder = Config::builder();
        match path {
            Some(path) => {
                debug!("Loading configuration from {:?}", path);
                builder = builder.add_source(File::from(path).format(FileFormat::Yaml).required(true));
            }
            None => {
                builder = builder.add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));
            }
        }
        builder = builder.add_source(
            Environment::with_prefix(config_defaults::ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );
        let config = builder
            .build()
            .map_err(|e| HospitalError::ConfigurationError(format!("Failed to build configuration: {}", e)))?;
        let app: AppConfig = config
            .try_deserialize()
            .map_err(|e| HospitalError::ConfigurationError(format!("Failed to deserialize configuration: {}", e)))?;
        app.validate()?;
        Ok(app)
    }

    pub fn validate(&self) -> HospitalResult<()> {
        let prefix = &self.billing.hospital_number_prefix;
        if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(HospitalError::ConfigurationError(format!(
                "billing.hospital_number_prefix '{}' must be uppercase ASCII letters",
                prefix
            )));
        }
        if self.security.token_ttl_hours <= 0 {
            return Err(HospitalError::ConfigurationError(
                "security.token_ttl_hours must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn should_fill_defaults_for_missing_sections() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "storage:\n  engine: in_memory\nbilling:\n  hospital_number_width: 5").unwrap();
        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.storage.engine, StorageEngineType::InMemory);
        assert_eq!(config.billing.hospital_number_width, 5);
        assert_eq!(config.billing.hospital_number_prefix, "MH");
        assert_eq!(config.server.port, DEFAULT_REST_API_PORT);
    }

    #[test]
    fn should_reject_lowercase_prefix() {
        let mut config = AppConfig::default();
        config.billing.hospital_number_prefix = "mh".to_string();
        assert!(matches!(config.validate(), Err(HospitalError::ConfigurationError(_))));
    }

    #[test]
    fn should_redact_jwt_secret_in_debug_output() {
        let rendered = format!("{:?}", SecurityConfig::default());
        assert!(!rendered.contains("change-me"));
    }
}
