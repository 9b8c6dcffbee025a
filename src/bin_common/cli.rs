//! Config path resolution for binaries
//!
//! Precedence: `--config <path>` on the command line, then the config
//! type's environment variable, then its default path.

use std::path::PathBuf;

const CONFIG_FLAG: &str = "--config";

/// Which settings file a binary reads
#[derive(Debug, Clone)]
pub enum ConfigType {
    /// Link settings (config/link.yaml)
    Link,
    /// Explicit path, also used as the default
    Custom(String),
}

impl ConfigType {
    pub fn default_path(&self) -> &str {
        match self {
            ConfigType::Link => "config/link.yaml",
            ConfigType::Custom(path) => path,
        }
    }

    pub fn env_var_name(&self) -> &str {
        match self {
            ConfigType::Link => "LINK_CONFIG_PATH",
            ConfigType::Custom(_) => "CONFIG_PATH",
        }
    }
}

/// Path from the environment variable, or the default
///
/// # Examples
/// ```
/// use companion_link::bin_common::{load_config_from_env, ConfigType};
///
/// let path = load_config_from_env(ConfigType::Link);
/// ```
pub fn load_config_from_env(config_type: ConfigType) -> PathBuf {
    std::env::var(config_type.env_var_name())
        .ok()
        .filter(|path| !path.is_empty())
        .unwrap_or_else(|| config_type.default_path().to_string())
        .into()
}

/// Path from `--config <path>` / `--config=<path>`, else [`load_config_from_env`]
///
/// `args` excludes the program name.
pub fn resolve_config_path<I>(args: I, config_type: ConfigType) -> PathBuf
where
    I: IntoIterator<Item = String>,
{
    config_flag(args).unwrap_or_else(|| load_config_from_env(config_type))
}

fn config_flag<I>(args: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        if arg == CONFIG_FLAG {
            return args.next().map(PathBuf::from);
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return Some(PathBuf::from(path));
        }
    }

    None
}
