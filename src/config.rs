//! Configuration for the help-desk back-end.
//!
//! Settings are read from `.helpdesk/helpdesk.toml` under the project
//! directory and layered as file → environment → CLI.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 3141
//! dev_mode = false
//!
//! [database]
//! path = ".helpdesk/helpdesk.db"
//!
//! [auth]
//! session_ttl_hours = 24
//! cookie_name = "helpdesk_session"
//! cookie_secure = false
//! allow_registration = true
//!
//! [pagination]
//! default_per_page = 10
//! max_per_page = 100
//!
//! [logging]
//! level = "info"
//! json = false
//! directory = ".helpdesk/logs"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_DIR: &str = ".helpdesk";
pub const CONFIG_FILE: &str = "helpdesk.toml";

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Permissive CORS for a dashboard served by a local dev server
    #[serde(default)]
    pub dev_mode: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3141
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            dev_mode: false,
        }
    }
}

/// `[database]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSection {
    /// SQLite file, relative paths resolve against the project directory
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".helpdesk/helpdesk.db")
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// `[auth]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSection {
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default)]
    pub cookie_secure: bool,
    #[serde(default = "default_allow_registration")]
    pub allow_registration: bool,
}

fn default_session_ttl_hours() -> i64 {
    24
}

fn default_cookie_name() -> String {
    "helpdesk_session".to_string()
}

fn default_allow_registration() -> bool {
    true
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            session_ttl_hours: default_session_ttl_hours(),
            cookie_name: default_cookie_name(),
            cookie_secure: false,
            allow_registration: default_allow_registration(),
        }
    }
}

/// `[pagination]` section.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PaginationSection {
    #[serde(default = "default_per_page")]
    pub default_per_page: i64,
    #[serde(default = "default_max_per_page")]
    pub max_per_page: i64,
}

fn default_per_page() -> i64 {
    10
}

fn default_max_per_page() -> i64 {
    100
}

impl Default for PaginationSection {
    fn default() -> Self {
        Self {
            default_per_page: default_per_page(),
            max_per_page: default_max_per_page(),
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    /// Filter directive used when neither `HELPDESK_LOG` nor `RUST_LOG` is set
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    /// When set, logs are also written to a daily rolling file here
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            directory: None,
        }
    }
}

/// The complete helpdesk.toml structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HelpdeskToml {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub auth: AuthSection,
    #[serde(default)]
    pub pagination: PaginationSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl HelpdeskToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse helpdesk.toml")
    }

    /// Load `helpdesk.toml` from `config_dir`, or defaults when it is missing.
    pub fn load_or_default(config_dir: &Path) -> Result<Self> {
        let config_path = config_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize helpdesk.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply `HELPDESK_*` environment overrides on top of the file values.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("HELPDESK_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("HELPDESK_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("Invalid HELPDESK_PORT '{}'", port))?;
        }
        if let Ok(path) = std::env::var("HELPDESK_DB_PATH") {
            self.database.path = PathBuf::from(path);
        }
        Ok(())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.pagination.default_per_page < 1 {
            warnings.push(format!(
                "pagination.default_per_page must be at least 1 (got {})",
                self.pagination.default_per_page
            ));
        }
        if self.pagination.max_per_page < 1 {
            warnings.push(format!(
                "pagination.max_per_page must be at least 1 (got {}), pages fall back to 1 item",
                self.pagination.max_per_page
            ));
        }
        if self.pagination.max_per_page < self.pagination.default_per_page {
            warnings.push(format!(
                "pagination.max_per_page ({}) is smaller than default_per_page ({})",
                self.pagination.max_per_page, self.pagination.default_per_page
            ));
        }
        if self.auth.session_ttl_hours < 1 {
            warnings.push(format!(
                "auth.session_ttl_hours must be at least 1 (got {})",
                self.auth.session_ttl_hours
            ));
        }
        if self.auth.cookie_name.trim().is_empty() {
            warnings.push("auth.cookie_name must not be empty".to_string());
        }
        let local = self.server.host == "127.0.0.1" || self.server.host == "localhost";
        if !self.auth.cookie_secure && !local {
            warnings.push(format!(
                "auth.cookie_secure is off while listening on {}",
                self.server.host
            ));
        }

        warnings
    }
}

/// Effective configuration: helpdesk.toml plus environment and CLI overrides.
#[derive(Debug, Clone)]
pub struct HelpdeskConfig {
    pub project_dir: PathBuf,
    pub config_dir: PathBuf,
    pub toml: HelpdeskToml,
    pub verbose: bool,
}

impl HelpdeskConfig {
    /// Load the configuration for a project directory (file → env).
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let config_dir = project_dir.join(CONFIG_DIR);
        let mut toml = HelpdeskToml::load_or_default(&config_dir)?;
        toml.apply_env()?;

        Ok(Self {
            project_dir,
            config_dir,
            toml,
            verbose: false,
        })
    }

    /// Load the configuration and apply CLI overrides last.
    pub fn with_cli_args(
        project_dir: PathBuf,
        verbose: bool,
        overrides: ServeOverrides,
    ) -> Result<Self> {
        let mut config = Self::new(project_dir)?;
        config.verbose = verbose;
        if let Some(host) = overrides.host {
            config.toml.server.host = host;
        }
        if let Some(port) = overrides.port {
            config.toml.server.port = port;
        }
        if let Some(path) = overrides.db_path {
            config.toml.database.path = path;
        }
        if overrides.dev_mode {
            config.toml.server.dev_mode = true;
        }
        Ok(config)
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    /// Database path resolved against the project directory.
    pub fn db_path(&self) -> PathBuf {
        self.resolve(&self.toml.database.path)
    }

    /// Log directory resolved against the project directory, if configured.
    pub fn log_dir(&self) -> Option<PathBuf> {
        self.toml.logging.directory.as_deref().map(|d| self.resolve(d))
    }

    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_dir.join(path)
        }
    }
}

/// CLI flags that override the file and environment layers.
#[derive(Debug, Clone, Default)]
pub struct ServeOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub db_path: Option<PathBuf>,
    pub dev_mode: bool,
}
