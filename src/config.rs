use std::{collections::HashMap, time::Duration};

use config::{Config as ConfigLib, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::crl::{FALLBACK_REFRESH_INTERVAL, HttpNetConfig};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crl: CrlConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrlConfig {
    /// Seeds the distribution point list when non-empty.
    pub default_url: String,
    /// Further distribution points, tried after the default one.
    pub distribution_points: Vec<String>,
    /// Delay before retrying after a scheduled update that installed nothing.
    pub retry_interval_secs: u64,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub validate_payload: bool,
}

impl CrlConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }
}

impl HttpConfig {
    pub fn net_config(&self) -> HttpNetConfig {
        HttpNetConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            validate_payload: self.validate_payload,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_sources(None)
    }

    pub fn load_with_sources(
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = ConfigLib::builder()
            .set_default("crl.default_url", "")?
            .set_default("crl.distribution_points", Vec::<String>::new())?
            .set_default(
                "crl.retry_interval_secs",
                FALLBACK_REFRESH_INTERVAL.as_secs(),
            )?
            .set_default("crl.http.timeout_secs", 30)?
            .set_default("crl.http.connect_timeout_secs", 10)?
            .set_default("crl.http.validate_payload", true)?
            .add_source(File::with_name("config/settings").required(false));

        // Explicit overrides replace the process environment, which keeps
        // tests independent of each other.
        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            // e.g. APP_CRL__DEFAULT_URL or APP_CRL__HTTP__TIMEOUT_SECS
            builder = builder.add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("crl.distribution_points")
                    .try_parsing(true),
            );
        }

        builder.build()?.try_deserialize()
    }
}
