pub mod error;
pub mod loader;

use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

pub use error::ConfigError;
pub use loader::{SupervisorConfigLoader, SupervisorConfigLoaderFile};

pub(crate) const DEFAULT_MAX_RETRY: u32 = 3;
pub(crate) const DEFAULT_STOP_TIMEOUT_SECS: u64 = 10;

/// Declarative description of one managed program. Immutable once bound to
/// a running [`crate::program::ProgramEngine`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProgramConfig {
    pub directory: PathBuf,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub auto_restart: bool,
    pub stdout_logfile: Option<PathBuf>,
    pub stderr_logfile: Option<PathBuf>,
    #[serde(default)]
    pub max_retry: u32,
    #[serde(default)]
    pub listen_addrs: Vec<String>,
    #[serde(default)]
    pub stop_timeout: u64,
    #[serde(default)]
    pub stop_before_restart: bool,
}

impl ProgramConfig {
    /// `max_retry` and `stop_timeout` default when zero/missing, per the
    /// TOML interface in spec.md §6.
    pub fn max_retry(&self) -> u32 {
        if self.max_retry == 0 {
            DEFAULT_MAX_RETRY
        } else {
            self.max_retry
        }
    }

    pub fn stop_timeout(&self) -> std::time::Duration {
        let secs = if self.stop_timeout == 0 {
            DEFAULT_STOP_TIMEOUT_SECS
        } else {
            self.stop_timeout
        };
        std::time::Duration::from_secs(secs)
    }

    /// Splits `command` on whitespace per spec.md §4.2's tokenization rule:
    /// the first token is the executable, remaining tokens precede `args`.
    /// Known limitation: quoted arguments are not supported (compatibility
    /// contract with the original implementation).
    pub fn argv(&self) -> (String, Vec<String>) {
        let mut tokens = self.command.split_whitespace().map(str::to_owned);
        let exe = tokens.next().unwrap_or_default();
        let mut argv: Vec<String> = tokens.collect();
        argv.extend(self.args.iter().cloned());
        (exe, argv)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Include {
    #[serde(default)]
    files: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default)]
    include: Include,
    #[serde(default, rename = "program")]
    pub programs: HashMap<String, ProgramConfig>,
}
