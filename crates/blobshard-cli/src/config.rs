use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default cap on a single stored input (50 MiB).
pub const DEFAULT_MAX_BLOB_SIZE: u64 = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error(
        "no data directory configured \
         (use --data-dir, BLOBSHARD_DATADIR or `data_dir` in the config file)"
    )]
    MissingDataDir,
}

/// Host configuration for the store.
///
/// Loaded from an optional TOML file; command-line flags and environment
/// variables override file values.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub data_dir: Option<PathBuf>,
    pub max_blob_size: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            max_blob_size: DEFAULT_MAX_BLOB_SIZE,
        }
    }
}

impl CliConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Start from `file` (if any) and apply overrides.
    pub fn resolve(
        file: Option<&Path>,
        data_dir: Option<PathBuf>,
        max_blob_size: Option<u64>,
    ) -> Result<Self, ConfigError> {
        let mut config = match file {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        if data_dir.is_some() {
            config.data_dir = data_dir;
        }
        if let Some(max) = max_blob_size {
            config.max_blob_size = max;
        }
        Ok(config)
    }

    /// The configured data directory; the store cannot be used without one.
    pub fn data_dir(&self) -> Result<&Path, ConfigError> {
        self.data_dir.as_deref().ok_or(ConfigError::MissingDataDir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = CliConfig::default();
        assert!(c.data_dir.is_none());
        assert_eq!(c.max_blob_size, 50 * 1024 * 1024);
        assert!(matches!(c.data_dir(), Err(ConfigError::MissingDataDir)));
    }

    #[test]
    fn parse_partial_toml() {
        let c: CliConfig = toml::from_str(r#"data_dir = "/srv/blobs""#).unwrap();
        assert_eq!(c.data_dir().unwrap(), Path::new("/srv/blobs"));
        assert_eq!(c.max_blob_size, DEFAULT_MAX_BLOB_SIZE);
    }

    #[test]
    fn flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blobshard.toml");
        std::fs::write(&path, "data_dir = \"/from/file\"\nmax_blob_size = 10\n").unwrap();

        let c = CliConfig::resolve(Some(path.as_path()), Some("/from/flag".into()), None).unwrap();
        assert_eq!(c.data_dir().unwrap(), Path::new("/from/flag"));
        assert_eq!(c.max_blob_size, 10);

        let c = CliConfig::resolve(Some(path.as_path()), None, Some(99)).unwrap();
        assert_eq!(c.data_dir().unwrap(), Path::new("/from/file"));
        assert_eq!(c.max_blob_size, 99);
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = CliConfig::resolve(Some(Path::new("/nonexistent/blobshard.toml")), None, None)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "max_blob_size = \"lots\"").unwrap();
        assert!(matches!(
            CliConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
