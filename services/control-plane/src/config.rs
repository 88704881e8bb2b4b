use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use fleetdeck_depgraph::{
    DependencyRules, DEFAULT_DEPENDENCY_PREFIXES, DEFAULT_PORT_EXCLUDE_PREFIX, DEFAULT_PORT_SUFFIX,
};

use crate::rebuild::LaunchMode;

const CONTAINERS_FILE: &str = "containers.json";
const POSITIONS_FILE: &str = "node-positions.json";

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub log_level: String,
    pub engine_url: String,
    pub engine_timeout: Duration,
    pub data_dir: PathBuf,
    pub scripts_dir: PathBuf,
    pub host_scripts_dir: PathBuf,
    pub host_user: String,
    pub launch_mode: LaunchMode,
    /// Interpreter for direct launches.
    pub shell: String,
    /// `None` disables the limit.
    pub rebuild_timeout: Option<Duration>,
    /// `None` disables the limit.
    pub log_idle_timeout: Option<Duration>,
    pub rules: DependencyRules,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any variable source. Unset variables take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let listen_addr = var("FLEETDECK_LISTEN_ADDR", "0.0.0.0:5005")
            .parse()
            .context("FLEETDECK_LISTEN_ADDR")?;

        let log_level = var("FLEETDECK_LOG_LEVEL", "info");
        let engine_url = var("FLEETDECK_ENGINE_URL", "http://localhost:2375");
        let engine_timeout = Duration::from_secs(secs(&var("FLEETDECK_ENGINE_TIMEOUT_SECS", "30"), "FLEETDECK_ENGINE_TIMEOUT_SECS")?);

        let data_dir = PathBuf::from(var("FLEETDECK_DATA_DIR", "data/cache"));
        let scripts_dir = PathBuf::from(var("FLEETDECK_SCRIPTS_DIR", "/app/scripts"));
        let host_scripts_dir = PathBuf::from(var("FLEETDECK_HOST_SCRIPTS_DIR", "/home/axitech/BPM2"));
        let host_user = var("FLEETDECK_HOST_USER", "axitech");
        let launch_mode = var("FLEETDECK_LAUNCH_MODE", "nsenter")
            .parse()
            .map_err(|e: String| anyhow!(e))
            .context("FLEETDECK_LAUNCH_MODE")?;
        let shell = var("FLEETDECK_SHELL", "bash");

        let rebuild_timeout = optional_limit(secs(
            &var("FLEETDECK_REBUILD_TIMEOUT_SECS", "3600"),
            "FLEETDECK_REBUILD_TIMEOUT_SECS",
        )?);
        let log_idle_timeout = optional_limit(secs(
            &var("FLEETDECK_LOG_IDLE_TIMEOUT_SECS", "1800"),
            "FLEETDECK_LOG_IDLE_TIMEOUT_SECS",
        )?);

        let dependency_prefixes = match lookup("FLEETDECK_DEPENDENCY_PREFIXES") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect(),
            None => DEFAULT_DEPENDENCY_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect(),
        };
        let rules = DependencyRules {
            dependency_prefixes,
            port_suffix: var("FLEETDECK_PORT_SUFFIX", DEFAULT_PORT_SUFFIX),
            port_exclude_prefix: var("FLEETDECK_PORT_EXCLUDE_PREFIX", DEFAULT_PORT_EXCLUDE_PREFIX),
        };

        Ok(Self {
            listen_addr,
            log_level,
            engine_url,
            engine_timeout,
            data_dir,
            scripts_dir,
            host_scripts_dir,
            host_user,
            launch_mode,
            shell,
            rebuild_timeout,
            log_idle_timeout,
            rules,
        })
    }

    pub fn containers_file(&self) -> PathBuf {
        self.data_dir.join(CONTAINERS_FILE)
    }

    pub fn positions_file(&self) -> PathBuf {
        self.data_dir.join(POSITIONS_FILE)
    }
}

fn secs(value: &str, key: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .with_context(|| format!("{key} must be a whole number of seconds"))
}

fn optional_limit(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
