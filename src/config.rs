//! Server Configuration
//!
//! Settings come from command-line flags only. Anything not given keeps the
//! default from [`Config::default`].
//!
//! ```text
//! stubhttpd [--host <IPV4>] [--port <PORT>] [--backlog <N>]
//!           [--log-file <PATH>] [--idle-timeout <SECONDS>]
//! ```

use crate::{DEFAULT_BACKLOG, DEFAULT_PORT};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// IPv4 address to bind to
    pub host: Ipv4Addr,
    /// Port to listen on
    pub port: u16,
    /// Accept backlog passed to listen()
    pub backlog: u32,
    /// Append log output to this file instead of stdout
    pub log_file: Option<PathBuf>,
    /// Close connections that send nothing for this long
    pub idle_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::UNSPECIFIED,
            port: DEFAULT_PORT,
            backlog: DEFAULT_BACKLOG,
            log_file: None,
            idle_timeout: None,
        }
    }
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Startup {
    Serve(Config),
    Help,
    Version,
}

/// Errors from parsing command-line flags.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} requires a value")]
    MissingValue(String),

    #[error("invalid value for {flag}: {value}")]
    InvalidValue { flag: String, value: String },

    #[error("unknown argument: {0}")]
    UnknownArgument(String),
}

impl Config {
    /// Parses command-line flags, excluding the program name.
    pub fn from_args<I>(args: I) -> Result<Startup, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = Config::default();
        let mut args = args.into_iter();

        while let Some(flag) = args.next() {
            match flag.as_str() {
                "--host" | "-h" => config.host = parse_value(&flag, args.next())?,
                "--port" | "-p" => config.port = parse_value(&flag, args.next())?,
                "--backlog" | "-b" => config.backlog = parse_value(&flag, args.next())?,
                "--log-file" | "-l" => {
                    let path = args
                        .next()
                        .ok_or_else(|| ConfigError::MissingValue(flag.clone()))?;
                    config.log_file = Some(PathBuf::from(path));
                }
                "--idle-timeout" | "-t" => {
                    let secs: u64 = parse_value(&flag, args.next())?;
                    config.idle_timeout = (secs > 0).then(|| Duration::from_secs(secs));
                }
                "--help" => return Ok(Startup::Help),
                "--version" | "-v" => return Ok(Startup::Version),
                _ => return Err(ConfigError::UnknownArgument(flag)),
            }
        }

        Ok(Startup::Serve(config))
    }

    /// Returns the socket address to bind.
    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.host, self.port))
    }
}

fn parse_value<T: std::str::FromStr>(flag: &str, value: Option<String>) -> Result<T, ConfigError> {
    let value = value.ok_or_else(|| ConfigError::MissingValue(flag.to_string()))?;
    value.parse().map_err(|_| ConfigError::InvalidValue {
        flag: flag.to_string(),
        value,
    })
}
