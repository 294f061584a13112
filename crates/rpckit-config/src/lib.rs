//! # rpckit Config
//!
//! Typed configuration system for the rpckit RPC framework.
//!
//! Configuration is loaded in layers, with later layers overriding earlier
//! ones:
//!
//! 1. Built-in defaults
//! 2. Configuration file (TOML or JSON)
//! 3. Environment variables (`RPCKIT__SECTION__KEY`)
//!
//! # Example
//!
//! ```no_run
//! use rpckit_config::ConfigLoader;
//!
//! # fn main() -> Result<(), rpckit_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_optional_file("rpckit.toml")?
//!     .with_env_prefix("RPCKIT")
//!     .load()?;
//!
//! println!("max workers: {}", config.server.max_workers);
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/rpckit-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;

pub use config::{
    LogSection, RpckitConfig, ServerConfig, TlsConfig, DEFAULT_MAX_MESSAGE_LENGTH,
    DEFAULT_MAX_WORKERS,
};
pub use error::ConfigError;
pub use loader::ConfigLoader;
