use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: IpAddr,
    pub port: u16,
    pub fetch: FetchConfig,
}

/// Outbound HTTP client settings.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub connect_timeout: Duration,
    pub timeout: Duration,
    pub max_redirects: usize,
    pub insecure_ssl: bool,
    pub use_system_proxy: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            timeout: Duration::from_secs(10),
            max_redirects: 10,
            insecure_ssl: false,
            use_system_proxy: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = FetchConfig::default();
        let fetch = FetchConfig {
            connect_timeout: Duration::from_secs(parse_var(
                &lookup,
                "READER_PROXY_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout.as_secs(),
            )?),
            timeout: Duration::from_secs(parse_var(
                &lookup,
                "READER_PROXY_FETCH_TIMEOUT_SECS",
                defaults.timeout.as_secs(),
            )?),
            max_redirects: parse_var(&lookup, "READER_PROXY_MAX_REDIRECTS", defaults.max_redirects)?,
            insecure_ssl: flag(&lookup, "READER_PROXY_INSECURE_SSL"),
            use_system_proxy: !flag(&lookup, "READER_PROXY_DISABLE_SYSTEM_PROXY"),
        };

        Ok(Self {
            bind: parse_var(&lookup, "READER_PROXY_BIND", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?,
            port: parse_var(&lookup, "PORT", DEFAULT_PORT)?,
            fetch,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> bool {
    lookup(key).as_deref() == Some("1")
}
