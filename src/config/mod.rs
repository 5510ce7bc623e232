mod settings;

pub use settings::*;

use anyhow::Result;
use std::path::Path;

/// Resolved process configuration: file values layered under CLI overrides.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub settings: Settings,
}

impl AppConfig {
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let settings = match config_file {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };

        Ok(Self { settings })
    }

    pub fn with_overrides(
        mut self,
        http_addr: Option<String>,
        metrics_addr: Option<String>,
        log_format: Option<LogFormat>,
        log_level: Option<String>,
    ) -> Self {
        if let Some(addr) = http_addr {
            self.settings.http.listen = addr;
        }
        if let Some(addr) = metrics_addr {
            self.settings.metrics.listen = addr;
        }
        if let Some(format) = log_format {
            self.settings.observability.log_format = format;
        }
        if let Some(level) = log_level {
            self.settings.observability.log_level = level;
        }
        self
    }
}
