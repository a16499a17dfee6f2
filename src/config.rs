use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

pub const DEFAULT_CONFIG_FILE: &str = "tse-lakehouse.json";
pub const DEFAULT_LISTING_BASE_URL: &str = "https://dadosabertos.tse.jus.br/dataset/resultados-";
pub const DEFAULT_TOKEN_ENV: &str = "GOOGLE_DRIVE_ACCESS_TOKEN";
pub const DEFAULT_DRIVE_API_URL: &str = "https://www.googleapis.com/drive/v3";
pub const DEFAULT_DRIVE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3";
pub const DEFAULT_CHUNK_SIZE_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_WINDOW_BYTES: usize = 1024 * 1024;

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub listing_base_url: Option<String>,
    pub folders: FolderConfig,
    #[serde(default)]
    pub store: Option<StoreConfig>,
    #[serde(default)]
    pub transfer: Option<TransferConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FolderConfig {
    pub raw: String,
    pub bronze: String,
    pub silver: String,
    pub gold: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreConfig {
    Local {
        #[serde(default)]
        root: Option<String>,
    },
    Drive {
        #[serde(default)]
        access_token_env: Option<String>,
        #[serde(default)]
        api_base_url: Option<String>,
        #[serde(default)]
        upload_base_url: Option<String>,
    },
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct TransferConfig {
    #[serde(default)]
    pub chunk_size_bytes: Option<usize>,
    #[serde(default)]
    pub window_bytes: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreSettings {
    Local {
        root: Option<Utf8PathBuf>,
    },
    Drive {
        access_token_env: String,
        api_base_url: String,
        upload_base_url: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferSettings {
    pub chunk_size_bytes: usize,
    pub window_bytes: usize,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            chunk_size_bytes: DEFAULT_CHUNK_SIZE_BYTES,
            window_bytes: DEFAULT_WINDOW_BYTES,
        }
    }
}

/// Immutable settings built once at startup and handed to every stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub listing_base_url: String,
    pub folders: FolderConfig,
    pub store: StoreSettings,
    pub transfer: TransferSettings,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, PipelineError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Err(PipelineError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| PipelineError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| PipelineError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, PipelineError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let folders = config.folders;
        for (layer, id) in [
            ("raw", &folders.raw),
            ("bronze", &folders.bronze),
            ("silver", &folders.silver),
            ("gold", &folders.gold),
        ] {
            if id.trim().is_empty() {
                return Err(PipelineError::ConfigParse(format!(
                    "folder id for {layer} layer is empty"
                )));
            }
        }

        let store = match config.store {
            None => StoreSettings::Local { root: None },
            Some(StoreConfig::Local { root }) => StoreSettings::Local {
                root: root.map(Utf8PathBuf::from),
            },
            Some(StoreConfig::Drive {
                access_token_env,
                api_base_url,
                upload_base_url,
            }) => StoreSettings::Drive {
                access_token_env: access_token_env.unwrap_or_else(|| DEFAULT_TOKEN_ENV.to_string()),
                api_base_url: api_base_url.unwrap_or_else(|| DEFAULT_DRIVE_API_URL.to_string()),
                upload_base_url: upload_base_url
                    .unwrap_or_else(|| DEFAULT_DRIVE_UPLOAD_URL.to_string()),
            },
        };

        let transfer_config = config.transfer.unwrap_or_default();
        let transfer = TransferSettings {
            chunk_size_bytes: transfer_config
                .chunk_size_bytes
                .unwrap_or(DEFAULT_CHUNK_SIZE_BYTES),
            window_bytes: transfer_config.window_bytes.unwrap_or(DEFAULT_WINDOW_BYTES),
        };
        if transfer.chunk_size_bytes == 0 || transfer.window_bytes == 0 {
            return Err(PipelineError::ConfigParse(
                "transfer sizes must be greater than zero".to_string(),
            ));
        }

        Ok(ResolvedConfig {
            schema_version,
            listing_base_url: config
                .listing_base_url
                .unwrap_or_else(|| DEFAULT_LISTING_BASE_URL.to_string()),
            folders,
            store,
            transfer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folders() -> FolderConfig {
        FolderConfig {
            raw: "raw".to_string(),
            bronze: "bronze".to_string(),
            silver: "silver".to_string(),
            gold: "gold".to_string(),
        }
    }

    #[test]
    fn resolve_defaults() {
        let config = Config {
            schema_version: None,
            listing_base_url: None,
            folders: folders(),
            store: None,
            transfer: None,
        };

        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.listing_base_url, DEFAULT_LISTING_BASE_URL);
        assert_eq!(resolved.store, StoreSettings::Local { root: None });
        assert_eq!(resolved.transfer, TransferSettings::default());
    }

    #[test]
    fn zero_window_is_rejected() {
        let config = Config {
            schema_version: None,
            listing_base_url: None,
            folders: folders(),
            store: None,
            transfer: Some(TransferConfig {
                chunk_size_bytes: Some(16),
                window_bytes: Some(0),
            }),
        };
        assert!(ConfigLoader::resolve_config(config).is_err());
    }
}
