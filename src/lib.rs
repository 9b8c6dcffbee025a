//! Companion Link - Main Library
//!
//! Glue between the `livelink` connection core and the processes that host
//! it.
//!
//! ## Architecture
//!
//! - **livelink**: Connection manager, keepalive, queue and event bus (re-exported from workspace)
//! - **config**: YAML + environment settings for a link
//! - **forward**: JSON-line rendering of link events for out-of-process consumers
//! - **logging**: tracing subscriber setup
//! - **bin_common**: Common utilities for binary executables
//!
//! ## Usage in Binaries
//!
//! ```rust,ignore
//! use companion_link::bin_common::{load_config_from_env, ConfigType};
//! use companion_link::config::LinkSettings;
//!
//! let settings = LinkSettings::load(load_config_from_env(ConfigType::Link))?;
//! let client = companion_link::livelink::builder()
//!     .config(settings.to_connection_config())
//!     .build()?;
//! ```

// Re-export workspace libraries for convenience
pub use livelink;

pub mod config;
pub mod forward;
pub mod logging;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;

    pub use cli::{load_config_from_env, resolve_config_path, ConfigType};
}
