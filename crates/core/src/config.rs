use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub mail: MailConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: SecretString,
    pub token_ttl_hours: i64,
}

#[derive(Clone, Debug)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
    pub use_tls: bool,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    /// Directory holding attachment files; created at bootstrap if absent.
    pub upload_dir: PathBuf,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub jwt_secret: Option<String>,
    pub upload_dir: Option<PathBuf>,
    pub smtp_host: Option<String>,
    pub from_address: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://quotedesk.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), port: 4000 },
            auth: AuthConfig { jwt_secret: String::new().into(), token_ttl_hours: 120 },
            mail: MailConfig {
                smtp_host: String::new(),
                smtp_port: 587,
                username: String::new(),
                password: String::new().into(),
                from_address: String::new(),
                use_tls: true,
            },
            storage: StorageConfig { upload_dir: PathBuf::from("uploads") },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    auth: Option<AuthPatch>,
    mail: Option<MailPatch>,
    storage: Option<StoragePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthPatch {
    jwt_secret: Option<String>,
    token_ttl_hours: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct MailPatch {
    smtp_host: Option<String>,
    smtp_port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    from_address: Option<String>,
    use_tls: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct StoragePatch {
    upload_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("quotedesk.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(auth) = patch.auth {
            if let Some(jwt_secret_value) = auth.jwt_secret {
                self.auth.jwt_secret = jwt_secret_value.into();
            }
            if let Some(token_ttl_hours) = auth.token_ttl_hours {
                self.auth.token_ttl_hours = token_ttl_hours;
            }
        }

        if let Some(mail) = patch.mail {
            if let Some(smtp_host) = mail.smtp_host {
                self.mail.smtp_host = smtp_host;
            }
            if let Some(smtp_port) = mail.smtp_port {
                self.mail.smtp_port = smtp_port;
            }
            if let Some(username) = mail.username {
                self.mail.username = username;
            }
            if let Some(password_value) = mail.password {
                self.mail.password = password_value.into();
            }
            if let Some(from_address) = mail.from_address {
                self.mail.from_address = from_address;
            }
            if let Some(use_tls) = mail.use_tls {
                self.mail.use_tls = use_tls;
            }
        }

        if let Some(storage) = patch.storage {
            if let Some(upload_dir) = storage.upload_dir {
                self.storage.upload_dir = upload_dir;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(url) = env::var("QUOTEDESK_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(level) = env::var("QUOTEDESK_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = env::var("QUOTEDESK_LOG_FORMAT") {
            self.logging.format = format.parse()?;
        }
        if let Ok(secret) = env::var("QUOTEDESK_JWT_SECRET") {
            self.auth.jwt_secret = secret.into();
        }
        if let Ok(host) = env::var("QUOTEDESK_SMTP_HOST") {
            self.mail.smtp_host = host;
        }
        if let Ok(port) = env::var("QUOTEDESK_SMTP_PORT") {
            self.mail.smtp_port = port.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                key: "QUOTEDESK_SMTP_PORT".to_string(),
                value: port,
            })?;
        }
        if let Ok(username) = env::var("QUOTEDESK_SMTP_USERNAME") {
            self.mail.username = username;
        }
        if let Ok(password) = env::var("QUOTEDESK_SMTP_PASSWORD") {
            self.mail.password = password.into();
        }
        if let Ok(from_address) = env::var("QUOTEDESK_MAIL_FROM") {
            self.mail.from_address = from_address;
        }
        if let Ok(upload_dir) = env::var("QUOTEDESK_UPLOAD_DIR") {
            self.storage.upload_dir = PathBuf::from(upload_dir);
        }
        if let Ok(bind_address) = env::var("QUOTEDESK_BIND_ADDRESS") {
            self.server.bind_address = bind_address;
        }
        if let Ok(port) = env::var("QUOTEDESK_PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                key: "QUOTEDESK_PORT".to_string(),
                value: port,
            })?;
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(jwt_secret_value) = overrides.jwt_secret {
            self.auth.jwt_secret = jwt_secret_value.into();
        }
        if let Some(upload_dir) = overrides.upload_dir {
            self.storage.upload_dir = upload_dir;
        }
        if let Some(smtp_host) = overrides.smtp_host {
            self.mail.smtp_host = smtp_host;
        }
        if let Some(from_address) = overrides.from_address {
            self.mail.from_address = from_address;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation("database.url must not be empty".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.auth.jwt_secret.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation("auth.jwt_secret must be set".to_string()));
        }
        if self.auth.token_ttl_hours <= 0 {
            return Err(ConfigError::Validation(
                "auth.token_ttl_hours must be positive".to_string(),
            ));
        }
        if !self.mail.smtp_host.trim().is_empty() && !self.mail.from_address.contains('@') {
            return Err(ConfigError::Validation(
                "mail.from_address must be a valid address when mail.smtp_host is set".to_string(),
            ));
        }
        Ok(())
    }
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }
    let default = PathBuf::from("quotedesk.toml");
    default.exists().then_some(default)
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use secrecy::ExposeSecret;

    use super::{AppConfig, ConfigOverrides, LoadOptions, LogFormat};

    fn options_with_secret() -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                jwt_secret: Some("test-secret".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[test]
    fn defaults_apply_when_no_file_is_present() {
        let config = AppConfig::load(options_with_secret()).expect("load");
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn file_patch_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            r#"
[database]
url = "sqlite::memory:"
max_connections = 2

[auth]
jwt_secret = "from-file"

[logging]
format = "json"
"#
        )
        .expect("write config");

        let config = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            overrides: ConfigOverrides::default(),
        })
        .expect("load");

        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.database.max_connections, 2);
        assert_eq!(config.auth.jwt_secret.expose_secret(), "from-file");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let result = AppConfig::load(LoadOptions {
            config_path: Some(PathBuf::from("/nonexistent/quotedesk.toml")),
            require_file: true,
            overrides: ConfigOverrides::default(),
        });
        assert!(result.is_err());
    }

    #[test]
    fn empty_jwt_secret_fails_validation() {
        let result = AppConfig::load(LoadOptions::default());
        let message = result.err().expect("validation error").to_string();
        assert!(message.contains("auth.jwt_secret"));
    }

    #[test]
    fn programmatic_overrides_win() {
        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite://elsewhere.db".to_string()),
                jwt_secret: Some("override".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect("load");
        assert_eq!(config.database.url, "sqlite://elsewhere.db");
    }
}
