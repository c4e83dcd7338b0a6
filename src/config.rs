//! Runtime configuration.

use std::path::PathBuf;

/// Resolved hub configuration.
///
/// Sources, in order: `serve` flags, then the `PORT` / `SHARED_DIR` /
/// `DATA_DIR` / `LOG_LEVEL` environment variables, then these defaults.
#[derive(Debug, Clone)]
pub struct HubConfig {
    pub host: String,
    pub port: u16,
    pub shared_dir: PathBuf,
    pub data_dir: PathBuf,
    pub log_level: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            shared_dir: PathBuf::from("./shared"),
            data_dir: PathBuf::from("./data"),
            log_level: "info".to_string(),
        }
    }
}

impl HubConfig {
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("roost.db")
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("roost.log")
    }

    pub fn error_log_path(&self) -> PathBuf {
        self.data_dir.join("roost.error.log")
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
