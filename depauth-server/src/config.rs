//! Server configuration.
//!
//! Loads configuration from a TOML file with support for environment
//! variable expansion in string values. Variables use `$VAR` or `${VAR}`
//! syntax; unresolved references are left as-is so startup can detect and
//! skip networks whose keys are missing.
//!
//! # Example Configuration
//!
//! ```toml
//! host = "0.0.0.0"
//! port = 4030
//!
//! [signing]
//! validity_secs = 300
//! indexer_offset_secs = 300
//!
//! [networks.bsc]
//! rpc_urls = ["https://bsc-dataseed.bnbchain.org"]
//! rpc_rate_limit = 50
//! signer_private_key = "$SIGNER_KEY_BSC"
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` — Path to configuration file (default: `config.toml`)
//! - `HOST` — Override server bind address
//! - `PORT` — Override server port
//! - Per-network signer keys referenced by `$VAR` in the config file

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;

use depauth::SigningWindow;
use serde::{Deserialize, Serialize};

/// Top-level server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (default: `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Server port (default: `4030`).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Signature timing policy durations.
    #[serde(default)]
    pub signing: SigningConfig,

    /// Network configurations keyed by network identifier.
    #[serde(default)]
    pub networks: HashMap<String, NetworkConfig>,
}

/// Timing policy durations for window-mode signatures.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SigningConfig {
    /// How long a signature stays valid past the anchoring block timestamp.
    #[serde(default = "default_validity_secs")]
    pub validity_secs: u64,

    /// Slack added to the human-facing deadline for indexer lag.
    #[serde(default = "default_indexer_offset_secs")]
    pub indexer_offset_secs: u64,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            validity_secs: default_validity_secs(),
            indexer_offset_secs: default_indexer_offset_secs(),
        }
    }
}

impl SigningConfig {
    /// Converts into the engine's timing policy.
    #[must_use]
    pub const fn window(&self) -> SigningWindow {
        SigningWindow {
            validity_secs: self.validity_secs,
            indexer_offset_secs: self.indexer_offset_secs,
        }
    }
}

/// Per-network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// HTTP RPC endpoint URLs, tried with fallback.
    pub rpc_urls: Vec<String>,

    /// Optional per-endpoint rate limit in requests per second.
    #[serde(default)]
    pub rpc_rate_limit: Option<u32>,

    /// Private key of the deposit authorization signer (hex, with or
    /// without `0x` prefix). Supports `$VAR` / `${VAR}` expansion.
    pub signer_private_key: String,
}

fn default_host() -> IpAddr {
    IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0))
}

fn default_port() -> u16 {
    4030
}

const fn default_validity_secs() -> u64 {
    300
}

const fn default_indexer_offset_secs() -> u64 {
    300
}

impl ServerConfig {
    /// Loads configuration from a file path.
    ///
    /// A missing file yields the defaults, matching the behavior of an
    /// empty TOML document. After parsing, `HOST` and `PORT` env vars
    /// override the file values.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = if Path::new(path).exists() {
            std::fs::read_to_string(path)?
        } else {
            String::new()
        };
        let mut config = Self::from_toml_str(&content)?;

        if let Ok(host) = std::env::var("HOST") {
            if let Ok(addr) = host.parse() {
                config.host = addr;
            }
        }
        if let Ok(port) = std::env::var("PORT") {
            if let Ok(p) = port.parse() {
                config.port = p;
            }
        }

        Ok(config)
    }

    /// Parses configuration from a TOML string, expanding environment
    /// variable references first.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML cannot be parsed.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        let expanded = expand_env_vars(content);
        toml::from_str(&expanded)
    }
}

/// Expands `$VAR` and `${VAR}` patterns in a string from environment
/// variables. Unresolved variables are left as-is.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' {
            let braced = chars.peek() == Some(&'{');
            if braced {
                chars.next();
            }

            let mut var_name = String::new();
            while let Some(&c) = chars.peek() {
                if braced {
                    if c == '}' {
                        chars.next();
                        break;
                    }
                } else if !c.is_ascii_alphanumeric() && c != '_' {
                    break;
                }
                var_name.push(c);
                chars.next();
            }

            if var_name.is_empty() {
                result.push('$');
                if braced {
                    result.push('{');
                }
            } else if let Ok(val) = std::env::var(&var_name) {
                result.push_str(&val);
            } else {
                result.push('$');
                if braced {
                    result.push('{');
                }
                result.push_str(&var_name);
                if braced {
                    result.push('}');
                }
            }
        } else {
            result.push(ch);
        }
    }

    result
}
