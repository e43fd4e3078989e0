use std::path::Path;

use crate::config::model::LadderConfig;
use crate::error::LadderError;

/// Read a ladder configuration from a JSON file.
///
/// Fields absent from the file keep their [`LadderConfig::default`] values.
pub async fn read_config(path: impl AsRef<Path>) -> Result<LadderConfig, LadderError> {
    let content = tokio::fs::read_to_string(path.as_ref()).await?;
    let config: LadderConfig = serde_json::from_str(&content)?;
    Ok(config)
}

/// Write a [`LadderConfig`] to disk as pretty-printed JSON.
pub async fn write_config(
    config: &LadderConfig,
    path: impl AsRef<Path>,
) -> Result<(), LadderError> {
    let content = serde_json::to_string_pretty(config)?;
    tokio::fs::write(path.as_ref(), content).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
