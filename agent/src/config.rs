use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

pub const ENV_HOST: &str = "NUT_HOST";
pub const ENV_PORT: &str = "NUT_PORT";
pub const ENV_URL: &str = "LOGGING_URL";
pub const ENV_QUIET: &str = "QUIET";
pub const ENV_INTERVAL: &str = "NUT_AGENT_INTERVAL_SECS";
/// `MAX_WATTS_<ups>=<watts>` sets the rated wattage of one unit.
pub const ENV_MAX_WATTS_PREFIX: &str = "MAX_WATTS_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },
    #[error("reading config file {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config TOML")]
    Parse(#[from] toml::de::Error),
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub nut: NutConfig,
    pub publish: PublishConfig,
    pub poll: PollConfig,
    /// Suppress informational logs; warnings and errors still print.
    pub quiet: bool,
    /// Rated output of each unit in watts, keyed by UPS name.
    pub max_watts: BTreeMap<String, u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NutConfig {
    pub host: String,
    /// 0 means unset.
    pub port: u16,
    pub connect_timeout_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub url: String,
    pub timeout_secs: u64,
    pub compression: Compression,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Zstd,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_secs: u64,
}

impl Default for NutConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 0,
            connect_timeout_secs: 10,
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_secs: 10,
            compression: Compression::None,
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self { interval_secs: 30 }
    }
}

impl NutConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl PublishConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl AgentConfig {
    /// Overlay environment variables on top of the current values.
    pub fn apply_env(&mut self, vars: &HashMap<String, String>) -> Result<(), ConfigError> {
        if let Some(v) = vars.get(ENV_HOST) {
            self.nut.host = v.trim().to_string();
        }
        if let Some(v) = vars.get(ENV_PORT) {
            self.nut.port = parse_value(ENV_PORT, v)?;
        }
        if let Some(v) = vars.get(ENV_URL) {
            self.publish.url = v.trim().to_string();
        }
        if let Some(v) = vars.get(ENV_QUIET) {
            self.quiet = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Some(v) = vars.get(ENV_INTERVAL) {
            self.poll.interval_secs = parse_value(ENV_INTERVAL, v)?;
        }
        for (key, value) in vars {
            if let Some(ups) = key.strip_prefix(ENV_MAX_WATTS_PREFIX).filter(|u| !u.is_empty()) {
                self.max_watts.insert(ups.to_string(), parse_value(key, value)?);
            }
        }
        Ok(())
    }

    /// Check required settings, reporting the first missing one by its
    /// environment variable name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nut.host.is_empty() {
            return Err(ConfigError::Missing(ENV_HOST));
        }
        if self.nut.port == 0 {
            return Err(ConfigError::Missing(ENV_PORT));
        }
        if self.publish.url.is_empty() {
            return Err(ConfigError::Missing(ENV_URL));
        }
        if reqwest::Url::parse(&self.publish.url).is_err() {
            return Err(invalid(ENV_URL, &self.publish.url));
        }
        if self.poll.interval_secs == 0 {
            return Err(invalid(ENV_INTERVAL, "0"));
        }
        Ok(())
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| invalid(key, value))
}

pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("org", "networkupstools", "nut-agent").map(|p| p.config_dir().join("agent.toml"))
}

fn read_file(path: &Path) -> Result<AgentConfig, ConfigError> {
    let s = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&s)?)
}

/// Defaults, then the TOML file, then the given environment.
pub fn resolve(file: Option<&Path>, vars: &HashMap<String, String>) -> Result<AgentConfig, ConfigError> {
    let mut cfg = match file {
        Some(path) => read_file(path)?,
        None => AgentConfig::default(),
    };
    cfg.apply_env(vars)?;
    cfg.validate()?;
    Ok(cfg)
}

/// An explicit path must exist; the per-user default is optional.
pub fn load_config_with_precedence(cli: Option<&PathBuf>) -> Result<AgentConfig, ConfigError> {
    let file = match cli {
        Some(p) => Some(p.clone()),
        None => default_config_path().filter(|p| p.exists()),
    };
    let vars: HashMap<String, String> = env::vars().collect();
    resolve(file.as_deref(), &vars)
}
