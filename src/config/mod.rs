pub mod types;

use std::path::Path;

use crate::error::{CalendarError, Result};
use types::Config;

pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        CalendarError::Config(format!(
            "failed to read config file {}: {e}",
            path.display()
        ))
    })?;
    if content.trim().is_empty() {
        return Ok(Config::default());
    }
    let config: Config = serde_yml::from_str(&content)?;
    if config.backend.base_url.trim().is_empty() {
        return Err(CalendarError::Config("backend.base_url must not be empty".into()));
    }
    Ok(config)
}
