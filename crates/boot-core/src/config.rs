//! Environment Configuration Loader
//!
//! Loads environment variables from the canonical location:
//! `/etc/glitter-boot/environment`, then builds a [`BootConfig`] from the
//! `GLITTER_BOOT_*` variables.
//!
//! ## Usage
//!
//! ```rust
//! use boot_core::config::{load_environment, BootConfig};
//!
//! load_environment();
//! let config = BootConfig::from_env();
//! assert!(config.store_path.ends_with("store.json"));
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Alternative paths to check (in order of priority)
pub const ENV_FILE_PATHS: &[&str] = &[
    "/etc/glitter-boot/environment",
    "/etc/glitter-boot.env",
    ".env",
];

/// Load environment variables from the canonical configuration file.
///
/// This function:
/// 1. Honors `GLITTER_BOOT_ENV_FILE` if set
/// 2. Checks `/etc/glitter-boot/environment` (system-wide)
/// 3. Falls back to `.env` in current directory (development)
/// 4. Does NOT override existing environment variables
///
/// Returns the path that was loaded, or None if no file was found.
pub fn load_environment() -> Option<String> {
    if let Ok(custom_path) = std::env::var("GLITTER_BOOT_ENV_FILE") {
        if let Some(path) = try_load_env_file(&custom_path) {
            return Some(path);
        }
    }

    for path in ENV_FILE_PATHS {
        if let Some(loaded_path) = try_load_env_file(path) {
            return Some(loaded_path);
        }
    }

    debug!("No environment file found, using existing environment");
    None
}

/// Try to load an environment file from the given path.
fn try_load_env_file(path: &str) -> Option<String> {
    let path_obj = Path::new(path);

    if !path_obj.exists() {
        return None;
    }

    match fs::read_to_string(path_obj) {
        Ok(content) => {
            let mut loaded_count = 0;
            let mut skipped_count = 0;

            for line in content.lines() {
                let line = line.trim();

                if line.is_empty() || line.starts_with('#') {
                    continue;
                }

                if let Some((key, value)) = parse_env_line(line) {
                    if std::env::var(&key).is_err() {
                        std::env::set_var(&key, &value);
                        loaded_count += 1;
                        debug!("Loaded: {}={}", key, masked(&key, &value));
                    } else {
                        skipped_count += 1;
                        debug!("Skipped (already set): {}", key);
                    }
                }
            }

            info!(
                "Loaded {} environment variables from {} ({} skipped - already set)",
                loaded_count, path, skipped_count
            );

            Some(path.to_string())
        }
        Err(e) => {
            warn!("Failed to read environment file {}: {}", path, e);
            None
        }
    }
}

/// Value as it may appear in logs: hidden for key, token and secret variables.
fn masked<'a>(key: &str, value: &'a str) -> &'a str {
    if key.contains("KEY") || key.contains("TOKEN") || key.contains("SECRET") {
        "***"
    } else {
        value
    }
}

/// Parse a single environment line into key-value pair.
fn parse_env_line(line: &str) -> Option<(String, String)> {
    // Handle: KEY=VALUE, KEY="VALUE", KEY='VALUE'
    let mut parts = line.splitn(2, '=');
    let key = parts.next()?.trim();
    let value = parts.next()?.trim();

    if key.is_empty() {
        return None;
    }

    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value);

    Some((key.to_string(), value.to_string()))
}

/// Get a configuration value with a default.
pub fn get_config(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Get an optional configuration value.
pub fn get_config_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an integer configuration value.
pub fn get_config_int(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Clamp an integer setting into `0..=u32::MAX`.
fn saturating_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

/// Host layout and tunables for one glitter-boot invocation.
///
/// Every path the lifecycle operations touch is derived from this struct so
/// tests can point the whole tool at a sandbox directory.
#[derive(Debug, Clone)]
pub struct BootConfig {
    /// Root of the node installation (`/usr/local/glitter`)
    pub install_dir: PathBuf,
    /// Staging directory for downloads, rendered files and keys
    pub work_dir: PathBuf,
    /// Backing file of the state store
    pub store_path: PathBuf,
    /// Where unit files are installed
    pub systemd_dir: PathBuf,
    /// Where binaries are installed
    pub bin_dir: PathBuf,
    /// Directories wiped during a reset
    pub scratch_dirs: Vec<PathBuf>,
    /// System user owning the installation
    pub user: String,
    /// System group owning the installation
    pub group: String,
    /// Consensus engine unit and binary name
    pub engine_service: String,
    /// Application unit and binary name
    pub app_service: String,
    /// Consensus RPC port on seed hosts
    pub engine_rpc_port: u16,
    /// Application API port on seed hosts
    pub app_api_port: u16,
    /// RPC endpoint of the local consensus engine
    pub local_rpc_url: String,
    /// Default engine binary URL when none is passed on the command line
    pub engine_binary_url: String,
    /// Default application binary URL when none is passed on the command line
    pub app_binary_url: String,
    /// Wait before the first validator-set query
    pub poll_grace: Duration,
    /// Wait between validator-set queries
    pub poll_interval: Duration,
    /// Consecutive RPC failures tolerated by the poller
    pub poll_failure_budget: u32,
    /// Optional overall bound on the poller
    pub poll_deadline: Option<Duration>,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self::with_install_dir("/usr/local/glitter")
    }
}

impl BootConfig {
    /// Layout rooted at `install_dir`, system paths at their usual locations.
    pub fn with_install_dir(install_dir: impl Into<PathBuf>) -> Self {
        let install_dir = install_dir.into();
        let work_dir = install_dir.join("glitter-boot");
        Self {
            store_path: work_dir.join("store.json"),
            work_dir,
            install_dir,
            systemd_dir: PathBuf::from("/etc/systemd/system"),
            bin_dir: PathBuf::from("/usr/bin"),
            scratch_dirs: vec![PathBuf::from("/tmp/kvstore")],
            user: "glitter".to_string(),
            group: "glitter".to_string(),
            engine_service: "tendermint".to_string(),
            app_service: "glitter".to_string(),
            engine_rpc_port: 26657,
            app_api_port: 26659,
            local_rpc_url: "http://127.0.0.1:26657".to_string(),
            engine_binary_url: String::new(),
            app_binary_url: String::new(),
            poll_grace: Duration::from_secs(5),
            poll_interval: Duration::from_secs(1),
            poll_failure_budget: 10,
            poll_deadline: None,
        }
    }

    /// Every path and tunable re-rooted under `root`, for tests and dry runs.
    pub fn sandboxed(root: &Path) -> Self {
        let mut config = Self::with_install_dir(root.join("install"));
        config.systemd_dir = root.join("systemd");
        config.bin_dir = root.join("bin");
        config.scratch_dirs = vec![root.join("scratch")];
        config
    }

    /// Build the configuration from `GLITTER_BOOT_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::with_install_dir(get_config(
            "GLITTER_BOOT_INSTALL_DIR",
            "/usr/local/glitter",
        ));

        if let Some(dir) = get_config_opt("GLITTER_BOOT_WORK_DIR") {
            config.work_dir = PathBuf::from(dir);
            config.store_path = config.work_dir.join("store.json");
        }
        if let Some(path) = get_config_opt("GLITTER_BOOT_STORE_PATH") {
            config.store_path = PathBuf::from(path);
        }
        if let Some(dir) = get_config_opt("GLITTER_BOOT_SYSTEMD_DIR") {
            config.systemd_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get_config_opt("GLITTER_BOOT_BIN_DIR") {
            config.bin_dir = PathBuf::from(dir);
        }
        if let Some(dirs) = get_config_opt("GLITTER_BOOT_SCRATCH_DIRS") {
            config.scratch_dirs = dirs
                .split(',')
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(PathBuf::from)
                .collect();
        }

        config.user = get_config("GLITTER_BOOT_USER", &config.user);
        config.group = get_config("GLITTER_BOOT_GROUP", &config.group);
        config.local_rpc_url = get_config("GLITTER_BOOT_LOCAL_RPC_URL", &config.local_rpc_url);
        config.engine_binary_url = get_config("GLITTER_BOOT_TENDERMINT_BIN_URL", "");
        config.app_binary_url = get_config("GLITTER_BOOT_GLITTER_BIN_URL", "");

        config.poll_failure_budget = saturating_u32(get_config_int(
            "GLITTER_BOOT_POLL_FAILURE_BUDGET",
            i64::from(config.poll_failure_budget),
        ));
        config.poll_deadline = match get_config_int("GLITTER_BOOT_POLL_DEADLINE_SECS", 0) {
            secs if secs > 0 => Some(Duration::from_secs(secs as u64)),
            _ => None,
        };

        config
    }

    /// Engine home (`<install>/tendermint`)
    pub fn engine_home(&self) -> PathBuf {
        self.install_dir.join(&self.engine_service)
    }

    /// Application home (`<install>/glitter`)
    pub fn app_home(&self) -> PathBuf {
        self.install_dir.join(&self.app_service)
    }

    /// Active engine config slot
    pub fn engine_active_config(&self) -> PathBuf {
        self.engine_home().join("config").join("config.toml")
    }

    /// Staged file inside the working directory
    pub fn staged(&self, name: &str) -> PathBuf {
        self.work_dir.join(name)
    }
}
