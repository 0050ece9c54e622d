use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use thiserror::Error;
use warp::http::Uri;

use crate::relay::DEFAULT_MAX_IMAGE_BYTES;

pub const DEFAULT_PORT: u16 = 4000;
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
    #[error("{present} is set but {missing} is not")]
    IncompleteTls {
        present: &'static str,
        missing: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub address: IpAddr,
    pub port: u16,
    pub cors_origin: String,
    pub static_dir: Option<PathBuf>,
    pub tls: Option<TlsPaths>,
    pub max_image_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            address: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_PORT,
            cors_origin: DEFAULT_CORS_ORIGIN.to_string(),
            static_dir: None,
            tls: None,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Empty values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Config::default();

        if let Some(value) = get("RELAY_ADDR") {
            config.address = parse("RELAY_ADDR", &value)?;
        }
        if let Some(value) = get("PORT") {
            config.port = parse("PORT", &value)?;
        }
        if let Some(value) = get("CORS_ORIGIN") {
            if !is_cors_origin(&value) {
                return Err(ConfigError::InvalidValue {
                    key: "CORS_ORIGIN",
                    value,
                });
            }
            config.cors_origin = value;
        }
        if let Some(value) = get("MAX_IMAGE_BYTES") {
            config.max_image_bytes = parse("MAX_IMAGE_BYTES", &value)?;
        }
        config.static_dir = get("STATIC_DIR").map(PathBuf::from);

        config.tls = match (get("TLS_CERT_PATH"), get("TLS_KEY_PATH")) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: PathBuf::from(cert),
                key: PathBuf::from(key),
            }),
            (Some(_), None) => {
                return Err(ConfigError::IncompleteTls {
                    present: "TLS_CERT_PATH",
                    missing: "TLS_KEY_PATH",
                })
            }
            (None, Some(_)) => {
                return Err(ConfigError::IncompleteTls {
                    present: "TLS_KEY_PATH",
                    missing: "TLS_CERT_PATH",
                })
            }
            (None, None) => None,
        };

        Ok(config)
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}

/// Accepts `*` or a bare `scheme://host[:port]` origin. warp panics at
/// startup on anything it cannot turn into an `Origin` header.
fn is_cors_origin(value: &str) -> bool {
    if value == "*" {
        return true;
    }
    let Ok(uri) = value.parse::<Uri>() else {
        return false;
    };
    let Some(authority) = uri.authority() else {
        return false;
    };

    matches!(uri.scheme_str(), Some("http" | "https"))
        && !authority.host().is_empty()
        && !authority.as_str().contains('@')
        && matches!(uri.path(), "" | "/")
        && uri.query().is_none()
}

fn parse<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}
