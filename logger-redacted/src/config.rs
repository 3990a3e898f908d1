// Logger configuration
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    pub json_output: bool,
    pub log_level: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            json_output: false,
            log_level: "info".to_string(),
        }
    }
}

impl LoggerConfig {
    pub fn verbose(mut self, verbose: bool) -> Self {
        if verbose {
            self.log_level = "debug".to_string();
        }
        self
    }

    pub fn with_json_output(mut self, json: bool) -> Self {
        self.json_output = json;
        self
    }

    /// Builds an `EnvFilter` directive applying the configured level to each target.
    pub fn filter_directive(&self, targets: &[&str]) -> String {
        targets
            .iter()
            .map(|target| format!("{}={}", target, self.log_level))
            .collect::<Vec<_>>()
            .join(",")
    }
}
