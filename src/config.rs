use std::fmt;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use tiberius::{AuthMethod, Config as TiberiusConfig};

use crate::error::ConnectorError;

/// Standard SQL Server listener port, used when the config omits `port`.
pub const DEFAULT_PORT: u16 = 1433;

/// Character set handed to the driver for every session.
pub const DEFAULT_CHARSET: &str = "UTF-8";

/// Connection settings supplied by the extraction tool's JSON config.
///
/// `port` may be written either as a number or as a string (`"1433"`); both
/// are validated into a `u16` at load time.
/// ```rust
/// use mssql_connector::ConnectionConfig;
///
/// let cfg = ConnectionConfig::from_json_str(
///     r#"{"user":"sa","password":"pw","host":"db","database":"sales","port":"14330"}"#,
/// )?;
/// assert_eq!(cfg.port, Some(14330));
/// # Ok::<(), mssql_connector::ConnectorError>(())
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub user: String,
    pub password: String,
    pub host: String,
    pub database: String,
    #[serde(default, deserialize_with = "deserialize_port")]
    pub port: Option<u16>,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("database", &self.database)
            .field("port", &self.port)
            .finish()
    }
}

impl ConnectionConfig {
    #[must_use]
    pub fn new(user: String, password: String, host: String, database: String) -> Self {
        Self {
            user,
            password,
            host,
            database,
            port: None,
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    /// Parse a config record from JSON text.
    ///
    /// # Errors
    /// Returns `ConnectorError::JsonError` if a required key is missing or `port` is not a valid
    /// port number.
    pub fn from_json_str(raw: &str) -> Result<Self, ConnectorError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Load a config record from a JSON file on disk.
    ///
    /// # Errors
    /// Returns `ConnectorError::IoError` if the file cannot be read, or `ConnectorError::JsonError`
    /// if its contents are not a valid config record.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConnectorError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Driver-level arguments for one connection attempt.
    #[must_use]
    pub fn driver_args(&self) -> DriverArgs {
        DriverArgs {
            user: self.user.clone(),
            password: self.password.clone(),
            server: self.host.clone(),
            database: self.database.clone(),
            charset: DEFAULT_CHARSET.to_string(),
            port: self.port.unwrap_or(DEFAULT_PORT).to_string(),
        }
    }
}

/// Arguments passed to [`crate::driver::Driver::connect`], derived from a
/// [`ConnectionConfig`] on every attempt.
#[derive(Clone, PartialEq, Eq)]
pub struct DriverArgs {
    pub user: String,
    pub password: String,
    pub server: String,
    pub database: String,
    pub charset: String,
    pub port: String,
}

impl fmt::Debug for DriverArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverArgs")
            .field("user", &self.user)
            .field("server", &self.server)
            .field("database", &self.database)
            .field("charset", &self.charset)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

impl DriverArgs {
    /// Build a `tiberius::Config` from these arguments.
    ///
    /// tiberius negotiates Unicode on the wire and decodes `VARCHAR` by column
    /// collation, so `charset` needs no driver setting.
    ///
    /// # Errors
    /// Returns `tiberius::error::Error::Conversion` if `port` is not a valid port number.
    pub fn to_tiberius_config(
        &self,
        trust_cert: bool,
    ) -> Result<TiberiusConfig, tiberius::error::Error> {
        let port: u16 = self.port.parse().map_err(|e| {
            tiberius::error::Error::Conversion(format!("invalid port {:?}: {e}", self.port).into())
        })?;

        let mut config = TiberiusConfig::new();
        config.host(&self.server);
        config.port(port);
        config.database(&self.database);
        config.authentication(AuthMethod::sql_server(&self.user, &self.password));
        if trust_cert {
            config.trust_cert();
        }
        Ok(config)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPort {
    Number(u64),
    Text(String),
}

fn deserialize_port<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<RawPort> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(RawPort::Number(n)) => u16::try_from(n)
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("port {n} is out of range"))),
        Some(RawPort::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(RawPort::Text(s)) => s
            .trim()
            .parse::<u16>()
            .map(Some)
            .map_err(|e| serde::de::Error::custom(format!("invalid port {s:?}: {e}"))),
    }
}
