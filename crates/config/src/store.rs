//! Small TOML state files next to the main config

use rscoop_errors::{ConfigError, Error};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tokio::fs;

/// Parse `path`; `Ok(None)` when the file does not exist
pub(crate) async fn read<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, Error> {
    let contents = match fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::io_with_path(&e, path)),
    };

    toml::from_str(&contents)
        .map(Some)
        .map_err(|e| {
            ConfigError::ParseError {
                message: format!("{}: {e}", path.display()),
            }
            .into()
        })
}

/// Serialize `value` to `path`, creating parent directories
pub(crate) async fn write<T: Serialize>(path: &Path, value: &T) -> Result<(), Error> {
    let contents = toml::to_string(value).map_err(|e| ConfigError::SerializeError {
        error: e.to_string(),
    })?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| write_error(path, &e))?;
    }
    fs::write(path, contents)
        .await
        .map_err(|e| write_error(path, &e))
}

fn write_error(path: &Path, err: &std::io::Error) -> Error {
    ConfigError::WriteError {
        path: path.display().to_string(),
        error: err.to_string(),
    }
    .into()
}
