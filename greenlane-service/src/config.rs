use std::path::Path;

use config::{Config, ConfigError, File};
use serde::Deserialize;

/// Configuration for the HTTP service.
#[derive(Debug, Deserialize)]
pub struct GreenlaneServiceConfig {
    /// The address and port where the service will listen for connections
    /// Format: "host:port" (e.g., "0.0.0.0:8765")
    #[serde(default = "default_service_bind_address")]
    pub service_bind_address: String,

    /// Whether the node runs inside a container, reported by the health endpoints.
    #[serde(default)]
    pub docker: bool,
}

fn default_service_bind_address() -> String {
    "0.0.0.0:8765".to_string()
}

impl GreenlaneServiceConfig {
    /// Creates a new `GreenlaneServiceConfig` instance from a configuration file.
    ///
    /// The file must contain a "greenlane_service" section. Environment variables
    /// prefixed with `GREENLANE_SERVICE__` override file values.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the section is missing.
    pub fn from_file_path<P: AsRef<Path>>(config_file_path: P) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::from(config_file_path.as_ref()))
            .add_source(
                config::Environment::with_prefix("GREENLANE_SERVICE")
                    .keep_prefix(true)
                    .separator("__"),
            );
        let config = builder.build()?;
        config.get::<Self>("greenlane_service")
    }
}
