//! Configuration module - environment variable parsing

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::game::layout::{
    Layout, LayoutError, ShipSet, DEFAULT_FIXED_LAYOUT, DEFAULT_GRID_HEIGHT, DEFAULT_GRID_WIDTH,
};
use crate::matchmaking::matchmaker::DEFAULT_MAX_CHAT_LEN;
use crate::util::rate_limit::INPUT_RATE_LIMIT;

/// Log output format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(()),
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Human-readable or JSON log lines
    pub log_format: LogFormat,

    /// Allowed client origins for CORS (`*` for any)
    pub client_origin: String,

    /// Grid dimensions, fleet and placement mode
    pub layout: Layout,
    /// Requeue the remaining participant when the opponent disconnects
    pub requeue_on_abort: bool,
    /// Fixed seed for matchmaking randomness (random when unset)
    pub rng_seed: Option<u64>,

    /// Inbound messages allowed per connection per second
    pub input_rate_limit: u32,
    /// Longest chat line relayed, in characters
    pub max_chat_len: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Render provides PORT env var, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let ship_set = ShipSet::new(
            parse_var("GRID_WIDTH", DEFAULT_GRID_WIDTH)?,
            parse_var("GRID_HEIGHT", DEFAULT_GRID_HEIGHT)?,
            match env::var("SHIP_LENGTHS") {
                Ok(raw) => parse_ship_lengths(&raw)
                    .ok_or(ConfigError::InvalidValue("SHIP_LENGTHS", raw))?,
                Err(_) => ShipSet::default().lengths().to_vec(),
            },
        )?;

        let layout_mode = env::var("LAYOUT_MODE").unwrap_or_else(|_| "random".to_string());
        let layout = match layout_mode.trim().to_ascii_lowercase().as_str() {
            "random" => Layout::random(ship_set),
            "fixed" => {
                let text =
                    env::var("FIXED_LAYOUT").unwrap_or_else(|_| DEFAULT_FIXED_LAYOUT.to_string());
                Layout::fixed(ship_set, &text)?
            }
            _ => return Err(ConfigError::InvalidValue("LAYOUT_MODE", layout_mode)),
        };
        probe_layout(&layout)?;

        let log_format = match env::var("LOG_FORMAT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidValue("LOG_FORMAT", raw))?,
            Err(_) => LogFormat::Pretty,
        };

        let rng_seed = match env::var("RNG_SEED") {
            Ok(raw) => Some(
                raw.trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("RNG_SEED", raw))?,
            ),
            Err(_) => None,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format,

            client_origin: env::var("CLIENT_ORIGIN").unwrap_or_else(|_| "*".to_string()),

            layout,
            requeue_on_abort: parse_var("REQUEUE_ON_ABORT", false)?,
            rng_seed,

            input_rate_limit: parse_var("INPUT_RATE_LIMIT", INPUT_RATE_LIMIT)?,
            max_chat_len: parse_var("MAX_CHAT_LEN", DEFAULT_MAX_CHAT_LEN)?,
        })
    }
}

/// Read an optional variable, falling back to `default` when unset
fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Parse a comma separated list of ship lengths, e.g. `5,4,3,3,2`
pub fn parse_ship_lengths(raw: &str) -> Option<Vec<usize>> {
    raw.split(',')
        .map(|part| part.trim().parse().ok())
        .collect()
}

/// Make sure a random layout can actually be dealt before accepting connections
fn probe_layout(layout: &Layout) -> Result<(), LayoutError> {
    layout
        .generate(&mut ChaCha8Rng::seed_from_u64(0))
        .map(|_| ())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1:?}")]
    InvalidValue(&'static str, String),

    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid grid layout: {0}")]
    Layout(#[from] LayoutError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ship_lengths_parse() {
        assert_eq!(parse_ship_lengths("5,4,3,3,2"), Some(vec![5, 4, 3, 3, 2]));
        assert_eq!(parse_ship_lengths(" 2 , 1 "), Some(vec![2, 1]));
        assert_eq!(parse_ship_lengths("5,,3"), None);
        assert_eq!(parse_ship_lengths("five"), None);
    }

    #[test]
    fn log_format_parse() {
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("Pretty".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn default_layouts_pass_the_probe() {
        assert!(probe_layout(&Layout::default()).is_ok());
        let fixed = Layout::fixed(ShipSet::default(), DEFAULT_FIXED_LAYOUT).unwrap();
        assert!(probe_layout(&fixed).is_ok());
    }
}
