use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigLoadError;
use crate::memory_library::LibrarySettings;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

pub const DEFAULT_REMOTE_PORT: u32 = 49587;
const DEFAULT_DISCOVERY_INTERVAL_MS: u64 = 1000;
const DEFAULT_GUEST_THROTTLE_SECS: u64 = 180;

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    remote: RemoteConfig,
    #[serde(default)]
    library: LibraryConfig,
}

#[derive(Deserialize, Default)]
struct RemoteConfig {
    // Kept wider than u16 so out-of-range values reach port validation
    // instead of failing as a parse error.
    port: Option<u32>,
    discovery: Option<bool>,
    discovery_interval_ms: Option<u64>,
}

#[derive(Deserialize, Default)]
struct LibraryConfig {
    guest_throttle_secs: Option<u64>,
    admin_password: Option<String>,
}

pub struct Config {
    remote: RemoteConfig,
    library: LibraryConfig,
}

impl Config {
    /// Embedded defaults merged with the user's config file, if any.
    /// A missing or malformed user file is logged and ignored.
    pub fn load() -> Self {
        let mut config = Self::embedded();

        if let Some(path) = user_config_path() {
            if path.exists() {
                match read_file(&path) {
                    Ok(user) => config.merge(user),
                    Err(e) => log::warn!(target: "config", "ignoring config {}: {}", path.display(), e),
                }
            }
        }

        config
    }

    /// Embedded defaults merged with an explicit file. Unlike `load`, a bad
    /// file is an error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigLoadError> {
        let mut config = Self::embedded();
        config.merge(read_file(path)?);
        Ok(config)
    }

    /// Embedded defaults merged with TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigLoadError> {
        let mut config = Self::embedded();
        config.merge(toml::from_str(contents)?);
        Ok(config)
    }

    fn embedded() -> Self {
        let base: ConfigFile = toml::from_str(DEFAULT_CONFIG).unwrap_or_else(|e| {
            log::error!(target: "config", "embedded config.toml is malformed: {}", e);
            ConfigFile::default()
        });
        Config {
            remote: base.remote,
            library: base.library,
        }
    }

    fn merge(&mut self, user: ConfigFile) {
        merge_remote(&mut self.remote, user.remote);
        merge_library(&mut self.library, user.library);
    }

    /// Raw configured port; validated when the server config is built.
    pub fn remote_port(&self) -> u32 {
        self.remote.port.unwrap_or(DEFAULT_REMOTE_PORT)
    }

    pub fn discovery_enabled(&self) -> bool {
        self.remote.discovery.unwrap_or(true)
    }

    /// Announcement interval. Zero would flood the network, so it falls
    /// back to the default.
    pub fn discovery_interval(&self) -> Duration {
        let ms = match self.remote.discovery_interval_ms {
            Some(0) => {
                log::warn!(
                    target: "config",
                    "discovery_interval_ms = 0 is not allowed, using {}",
                    DEFAULT_DISCOVERY_INTERVAL_MS
                );
                DEFAULT_DISCOVERY_INTERVAL_MS
            }
            Some(ms) => ms,
            None => DEFAULT_DISCOVERY_INTERVAL_MS,
        };
        Duration::from_millis(ms)
    }

    pub fn library_settings(&self) -> LibrarySettings {
        LibrarySettings {
            guest_throttle: Duration::from_secs(
                self.library
                    .guest_throttle_secs
                    .unwrap_or(DEFAULT_GUEST_THROTTLE_SECS),
            ),
            admin_password: self
                .library
                .admin_password
                .clone()
                .filter(|p| !p.is_empty()),
        }
    }
}

fn read_file(path: &Path) -> Result<ConfigFile, ConfigLoadError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&contents)?)
}

pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cadenza").join("config.toml"))
}

fn merge_remote(base: &mut RemoteConfig, user: RemoteConfig) {
    if user.port.is_some() {
        base.port = user.port;
    }
    if user.discovery.is_some() {
        base.discovery = user.discovery;
    }
    if user.discovery_interval_ms.is_some() {
        base.discovery_interval_ms = user.discovery_interval_ms;
    }
}

fn merge_library(base: &mut LibraryConfig, user: LibraryConfig) {
    if user.guest_throttle_secs.is_some() {
        base.guest_throttle_secs = user.guest_throttle_secs;
    }
    if user.admin_password.is_some() {
        base.admin_password = user.admin_password;
    }
}
