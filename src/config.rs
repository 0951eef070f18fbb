use crate::error::ConfigError;
use crate::import::ImportSettings;
use serde::Deserialize;
use sqlx::mysql::MySqlConnectOptions;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// INI section read by the loader.
pub const INI_SECTION: &str = "bulkload";

/// Section name used by existing loader config files; read when
/// [`INI_SECTION`] is absent.
pub const LEGACY_INI_SECTION: &str = "go-load";

/// Fully resolved loader configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LoaderConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub workers: usize,
    pub channel_buffer_size: usize,
    /// Accepted for compatibility; statements are never batched.
    pub chunk_size: usize,
    pub pattern: String,
    /// Interval of the queue status log line; `None` disables it.
    pub status_interval: Option<Duration>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: String::new(),
            password: String::new(),
            database: String::new(),
            workers: 4,
            channel_buffer_size: 2000,
            chunk_size: 50_000,
            pattern: crate::import::DEFAULT_DATA_PATTERN.to_string(),
            status_interval: Some(Duration::from_secs(1)),
        }
    }
}

/// Values given explicitly on the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub workers: Option<usize>,
    pub channel_buffer_size: Option<usize>,
    pub chunk_size: Option<usize>,
    pub pattern: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct IniSection {
    mysql_user: Option<String>,
    mysql_password: Option<String>,
    mysql_host: Option<String>,
    mysql_port: Option<u16>,
    database: Option<String>,
    workers: Option<usize>,
    channel_buffer_size: Option<usize>,
    chunk_size: Option<usize>,
    pattern: Option<String>,
}

impl IniSection {
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let ini_error = |source| ConfigError::IniFile {
            path: path.to_path_buf(),
            source,
        };

        let settings = config::Config::builder()
            .add_source(
                config::File::from(PathBuf::from(path))
                    .format(config::FileFormat::Ini)
                    .required(true),
            )
            .build()
            .map_err(ini_error)?;

        for section in [INI_SECTION, LEGACY_INI_SECTION] {
            match settings.get::<IniSection>(section) {
                Ok(found) => {
                    log::debug!("reading [{}] from {}", section, path.display());
                    return Ok(found);
                }
                Err(config::ConfigError::NotFound(_)) => continue,
                Err(err) => return Err(ini_error(err)),
            }
        }

        log::warn!(
            "ini file {} has no [{}] or [{}] section",
            path.display(),
            INI_SECTION,
            LEGACY_INI_SECTION
        );
        Ok(IniSection::default())
    }
}

impl LoaderConfig {
    /// Resolve the configuration from defaults, an optional INI file and CLI flags.
    ///
    /// Flags win over INI values, except `mysql-user`, `mysql-password` and
    /// `mysql-host`: when the INI file sets those, they win over flags.
    pub fn load(overrides: ConfigOverrides, ini_file: Option<&Path>) -> Result<Self, ConfigError> {
        let ini = ini_file.map(IniSection::load).transpose()?;

        let mut config = Self::default();
        if let Some(ini) = &ini {
            config.apply_ini(ini);
        }
        config.apply_overrides(overrides);
        if let Some(ini) = &ini {
            config.apply_ini_credentials(ini);
        }

        config.validate()?;
        Ok(config)
    }

    fn apply_ini(&mut self, ini: &IniSection) {
        self.apply_ini_credentials(ini);
        if let Some(port) = ini.mysql_port {
            self.port = port;
        }
        if let Some(database) = &ini.database {
            self.database = database.clone();
        }
        if let Some(workers) = ini.workers {
            self.workers = workers;
        }
        if let Some(size) = ini.channel_buffer_size {
            self.channel_buffer_size = size;
        }
        if let Some(size) = ini.chunk_size {
            self.chunk_size = size;
        }
        if let Some(pattern) = &ini.pattern {
            self.pattern = pattern.clone();
        }
    }

    fn apply_ini_credentials(&mut self, ini: &IniSection) {
        if let Some(user) = &ini.mysql_user {
            self.user = user.clone();
        }
        if let Some(password) = &ini.mysql_password {
            self.password = password.clone();
        }
        if let Some(host) = &ini.mysql_host {
            self.host = host.clone();
        }
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        let ConfigOverrides {
            host,
            port,
            user,
            password,
            database,
            workers,
            channel_buffer_size,
            chunk_size,
            pattern,
        } = overrides;

        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port;
        }
        if let Some(user) = user {
            self.user = user;
        }
        if let Some(password) = password {
            self.password = password;
        }
        if let Some(database) = database {
            self.database = database;
        }
        if let Some(workers) = workers {
            self.workers = workers;
        }
        if let Some(size) = channel_buffer_size {
            self.channel_buffer_size = size;
        }
        if let Some(size) = chunk_size {
            self.chunk_size = size;
        }
        if let Some(pattern) = pattern {
            self.pattern = pattern;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.channel_buffer_size == 0 {
            return Err(ConfigError::Invalid(
                "channel buffer size must be at least 1".into(),
            ));
        }
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".into()));
        }
        Ok(())
    }

    pub fn connect_options(&self) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user);
        if !self.password.is_empty() {
            options = options.password(&self.password);
        }
        if !self.database.is_empty() {
            options = options.database(&self.database);
        }
        options
    }

    /// Connection string with the password masked, for log lines.
    pub fn redacted_url(&self) -> String {
        let credentials = if self.password.is_empty() {
            self.user.clone()
        } else {
            format!("{}:***", self.user)
        };
        format!(
            "mysql://{}@{}:{}/{}",
            credentials, self.host, self.port, self.database
        )
    }

    pub fn max_connections(&self) -> u32 {
        let wanted = self.workers.saturating_mul(self.workers).max(1);
        u32::try_from(wanted).unwrap_or(u32::MAX)
    }

    pub fn import_settings(&self) -> ImportSettings {
        ImportSettings {
            workers: self.workers,
            channel_buffer_size: self.channel_buffer_size,
            status_interval: self.status_interval,
        }
    }
}
