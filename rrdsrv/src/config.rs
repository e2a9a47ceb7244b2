use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Configuration for the export proxy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind the HTTP server to
    pub bind_address: String,

    /// Directory under which rrd file references must resolve
    pub rrd_root_path: String,

    /// Name or path of the rrdtool binary to invoke
    pub rrdtool_path: String,

    /// Enable transparent response compression
    pub compress: bool,

    /// Maximum accepted length for a raw query, in bytes
    pub max_query_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:9191".to_string(),
            rrd_root_path: "./".to_string(),
            rrdtool_path: "rrdtool".to_string(),
            compress: false,
            max_query_length: rrdsrv_core::MAX_QUERY_LENGTH,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables and defaults
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(bind_addr) = env::var("RRDSRV_BIND_ADDRESS") {
            config.bind_address = bind_addr;
        }

        if let Ok(rrd_dir) = env::var("RRDSRV_RRD_DIR") {
            config.rrd_root_path = rrd_dir;
        }

        if let Ok(rrdtool) = env::var("RRDSRV_RRDTOOL_PATH") {
            config.rrdtool_path = rrdtool;
        }

        if let Ok(compress) = env::var("RRDSRV_COMPRESS") {
            config.compress = compress.parse()?;
        }

        if let Ok(max_len) = env::var("RRDSRV_MAX_QUERY_LENGTH") {
            config.max_query_length = max_len.parse()?;
        }

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.bind_address.is_empty() {
            return Err(anyhow::anyhow!("Bind address cannot be empty"));
        }

        if self.rrd_root_path.is_empty() {
            return Err(anyhow::anyhow!("RRD root path cannot be empty"));
        }

        if self.rrdtool_path.is_empty() {
            return Err(anyhow::anyhow!("rrdtool path cannot be empty"));
        }

        if self.max_query_length == 0 {
            return Err(anyhow::anyhow!("Max query length must be greater than 0"));
        }

        Ok(())
    }
}
