use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::auth::Credentials;
use crate::tls::TlsFiles;

/// Name of the journal file inside the data directory.
pub const WAL_FILE_NAME: &str = "camrent.wal";

/// Server settings, read from `CAMRENT_*` environment variables.
/// Unparseable numbers fall back to their defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub credentials: Credentials,
    pub max_connections: usize,
    /// Journal appends since the last compaction that trigger the next one.
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
    pub tls: Option<TlsFiles>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let tls = match (get("CAMRENT_TLS_CERT"), get("CAMRENT_TLS_KEY")) {
            (None, None) => None,
            (Some(cert), Some(key)) => Some(TlsFiles {
                cert: cert.into(),
                key: key.into(),
            }),
            _ => return Err(ConfigError::TlsPair),
        };

        Ok(Self {
            bind: get("CAMRENT_BIND").unwrap_or_else(|| "0.0.0.0".into()),
            port: parsed(&get, "CAMRENT_PORT").unwrap_or(5433),
            data_dir: get("CAMRENT_DATA_DIR").unwrap_or_else(|| "./data".into()).into(),
            credentials: Credentials {
                admin_password: get("CAMRENT_PASSWORD").unwrap_or_else(|| "admin123".into()),
                visitor_password: get("CAMRENT_VISITOR_PASSWORD")
                    .unwrap_or_else(|| "visitor".into()),
            },
            max_connections: parsed(&get, "CAMRENT_MAX_CONNECTIONS").unwrap_or(256),
            compact_threshold: parsed(&get, "CAMRENT_COMPACT_THRESHOLD").unwrap_or(1000),
            metrics_port: parsed(&get, "CAMRENT_METRICS_PORT"),
            tls,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join(WAL_FILE_NAME)
    }
}

/// Unset or unparseable both read as None.
fn parsed<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    get(key).and_then(|s| s.trim().parse().ok())
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    TlsPair,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::TlsPair => {
                write!(f, "both CAMRENT_TLS_CERT and CAMRENT_TLS_KEY must be set, or neither")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
