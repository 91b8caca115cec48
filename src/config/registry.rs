use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Where the permissions registry is loaded from at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegistryConfig {
    /// The table compiled into the binary.
    #[default]
    Builtin,

    /// A JSON document of the form `{"users": [ ...records ]}`.
    File { path: PathBuf },
}

impl RegistryConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if let RegistryConfig::File { path } = self
            && path.as_os_str().is_empty()
        {
            return Err(ConfigError::Validation(
                "registry.path must not be empty".into(),
            ));
        }
        Ok(())
    }
}
