use std::time::Duration;
use std::{env, fmt, fs, io, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use urlcheck::{DispatcherConfig, SmtpSettings};

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot read config file: {0}")]
    ReadFailed(io::Error),
    #[error("cannot write config file: {0}")]
    WriteFailed(io::Error),
    #[error("cannot parse config file: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("cannot serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("no config directory available (set XDG_CONFIG_HOME or HOME)")]
    ConfigPathUnavailable,
}

/// Service settings, everything except the checks themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mail: Mail,
    pub smtp: SmtpSettings,
    pub dispatcher: Dispatcher,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Mail {
    /// Send alert emails at all
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dispatcher {
    /// Probes running at once
    pub workers: usize,
    /// Wait for in-flight probes at shutdown, written as "10s", "1500ms", ...
    #[serde(with = "humantime_duration")]
    pub grace_period: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self { mail: Mail::default(), smtp: SmtpSettings::default(), dispatcher: Dispatcher::default() }
    }
}

impl Default for Mail {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        let defaults = DispatcherConfig::default();
        Self { workers: defaults.workers, grace_period: defaults.grace_period }
    }
}

impl Dispatcher {
    pub fn to_dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig { workers: self.workers, grace_period: self.grace_period }
    }
}

/// Durations in the settings file use the humantime syntax.
mod humantime_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(de::Error::custom)
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/urlcheck/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("urlcheck/config.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);
        let login = self.smtp.login.as_deref().unwrap_or("-");
        let password = if self.smtp.password.is_some() { "<set>" } else { "-" };

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Mail")?;
        write_1(f, "Enabled", &self.mail.enabled)?;
        write_title_1(f, "SMTP")?;
        write_1(f, "Host", &self.smtp.host)?;
        write_1(f, "Port", &self.smtp.port)?;
        write_1(f, "Security", &self.smtp.security)?;
        write_1(f, "Login", &login)?;
        write_1(f, "Password", &password)?;
        write_1(f, "From", &self.smtp.from)?;
        write_title_1(f, "Dispatcher")?;
        write_1(f, "Workers", &self.dispatcher.workers)?;
        write_1(f, "Grace Period", &humantime::format_duration(self.dispatcher.grace_period))?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/urlcheck/config.toml
    ///  or the specified path, with the name config.toml if one does not exist.
    /// Failing to write that default file is not an error, the defaults are
    /// still returned.
    ///
    /// ```rust,ignore
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path).map_err(Error::ReadFailed)?;
            Ok(toml::from_str(raw_string.as_str())?)
        } else {
            let config = Self::default();
            if let Err(e) = config.write_config(&config_path) {
                warn!(path = %config_path.display(), "Running with default settings: {e}");
            }
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(Error::WriteFailed)?;
        }

        fs::write(path, config_str).map_err(Error::WriteFailed)
    }
}
