//! Connection descriptor for the Azure SQL variant.
//!
//! The descriptor renders the `mssql+pyodbc://` URL that the downstream SQL engine layer
//! consumes, and can also open a Tiberius connection from the same resolved fields. Building
//! it does no I/O; nothing connects until [`EngineDescriptor::connect`] is called.

use std::collections::HashMap;
use std::fmt;

use crate::config::{ConnectionConfig, DEFAULT_PORT};
use crate::connection::Connection;
use crate::driver::{TiberiusDriver, TiberiusSession};
use crate::error::ConnectorError;
use crate::factory::ConnectionFactory;
use crate::retry::RetryPolicy;

pub const URL_PREFIX: &str = "mssql+pyodbc://";
pub const ODBC_DRIVER: &str = "ODBC+Driver+17+for+SQL+Server";
pub const AUTHENTICATION: &str = "SqlPassword";

/// The fields the builder resolves, each backed by one environment variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AzureField {
    Username,
    Password,
    Port,
    Host,
    Database,
}

impl AzureField {
    #[must_use]
    pub fn variable(self) -> &'static str {
        match self {
            AzureField::Username => "AZUREDB_USERNAME",
            AzureField::Password => "AZUREDB_PASSWORD",
            AzureField::Port => "AZUREDB_PORT",
            AzureField::Host => "AZUREDB_HOST",
            AzureField::Database => "AZUREDB_NAME",
        }
    }
}

impl fmt::Display for AzureField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AzureField::Username => "username",
            AzureField::Password => "password",
            AzureField::Port => "port",
            AzureField::Host => "host",
            AzureField::Database => "database",
        };
        f.write_str(name)
    }
}

/// Where the builder looks for each field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionStrategy {
    /// Environment variables only; the config record is not consulted.
    #[default]
    EnvironmentOnly,
    /// Environment variables first, then the config record (port falls back to 1433).
    EnvironmentThenConfig,
}

/// Read access to environment variables.
pub trait EnvSource {
    fn var(&self, name: &str) -> Option<String>;
}

/// The current process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl EnvSource for HashMap<&str, &str> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).map(|v| (*v).to_string())
    }
}

/// Lazily-connecting engine handle backed by a connection URL.
#[derive(Clone, PartialEq, Eq)]
pub struct EngineDescriptor {
    url: String,
    user: String,
    password: String,
    host: String,
    port: u16,
    database: String,
}

impl fmt::Debug for EngineDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineDescriptor")
            .field("url", &self.redacted_url())
            .finish_non_exhaustive()
    }
}

impl EngineDescriptor {
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The URL with the password segment masked, for logs.
    #[must_use]
    pub fn redacted_url(&self) -> String {
        render_url(&urlencoding::encode(&self.user), "***", &self.host, self.port, &self.database)
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    /// The resolved fields as a primary-path config record.
    #[must_use]
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig::new(
            self.user.clone(),
            self.password.clone(),
            self.host.clone(),
            self.database.clone(),
        )
        .with_port(Some(self.port))
    }

    /// Connect using the resolved fields, with certificate validation on.
    ///
    /// # Errors
    /// Returns the Tiberius error from the last attempt if the retry budget is spent.
    pub async fn connect(&self) -> Result<Connection<TiberiusSession>, tiberius::error::Error> {
        self.connect_with_policy(RetryPolicy::default()).await
    }

    /// Like [`EngineDescriptor::connect`] with a caller-supplied retry policy.
    ///
    /// # Errors
    /// Returns the Tiberius error from the last attempt if the retry budget is spent.
    pub async fn connect_with_policy(
        &self,
        policy: RetryPolicy,
    ) -> Result<Connection<TiberiusSession>, tiberius::error::Error> {
        ConnectionFactory::new(TiberiusDriver::new().trust_cert(false))
            .with_policy(policy)
            .open(&self.connection_config())
            .await
    }
}

fn render_url(user: &str, password: &str, host: &str, port: u16, database: &str) -> String {
    format!(
        "{URL_PREFIX}{user}:{password}@{host}:{port}/{database}?driver={ODBC_DRIVER}\
         &Authentication={AUTHENTICATION}&autocommit=True&IntegratedSecurity=False"
    )
}

struct Resolver<'a, E: EnvSource + ?Sized> {
    config: &'a ConnectionConfig,
    env: &'a E,
    strategy: ResolutionStrategy,
}

impl<E: EnvSource + ?Sized> Resolver<'_, E> {
    fn field(&self, field: AzureField) -> Result<String, ConnectorError> {
        let from_env = self.env.var(field.variable()).filter(|v| !v.is_empty());
        let value = match (from_env, self.strategy) {
            (Some(value), _) => Some(value),
            (None, ResolutionStrategy::EnvironmentOnly) => None,
            (None, ResolutionStrategy::EnvironmentThenConfig) => self.from_config(field),
        };
        value
            .filter(|v| !v.is_empty())
            .ok_or(ConnectorError::MissingField { field })
    }

    fn from_config(&self, field: AzureField) -> Option<String> {
        let config = self.config;
        Some(match field {
            AzureField::Username => config.user.clone(),
            AzureField::Password => config.password.clone(),
            AzureField::Port => config.port.unwrap_or(DEFAULT_PORT).to_string(),
            AzureField::Host => config.host.clone(),
            AzureField::Database => config.database.clone(),
        })
    }
}

/// Build the Azure SQL engine descriptor.
///
/// ```rust
/// use std::collections::HashMap;
/// use mssql_connector::azure::{ResolutionStrategy, build_engine_descriptor};
/// use mssql_connector::ConnectionConfig;
///
/// let env: HashMap<&str, &str> = HashMap::from([
///     ("AZUREDB_USERNAME", "loader"),
///     ("AZUREDB_PASSWORD", "p@ss/word"),
///     ("AZUREDB_PORT", "1433"),
///     ("AZUREDB_HOST", "dw.database.windows.net"),
///     ("AZUREDB_NAME", "warehouse"),
/// ]);
/// let cfg = ConnectionConfig::new("u".into(), "p".into(), "h".into(), "d".into());
/// let engine = build_engine_descriptor(&cfg, &env, ResolutionStrategy::EnvironmentOnly)?;
/// assert!(engine.url().starts_with("mssql+pyodbc://loader:p%40ss%2Fword@"));
/// assert!(engine.url().contains("@dw.database.windows.net:1433/warehouse?"));
/// # Ok::<(), mssql_connector::ConnectorError>(())
/// ```
///
/// # Errors
/// Returns `ConnectorError::MissingField` if a field resolves to nothing, or
/// `ConnectorError::ConfigError` if the port is not a valid port number.
pub fn build_engine_descriptor<E: EnvSource + ?Sized>(
    config: &ConnectionConfig,
    env: &E,
    strategy: ResolutionStrategy,
) -> Result<EngineDescriptor, ConnectorError> {
    let resolver = Resolver {
        config,
        env,
        strategy,
    };

    let user = resolver.field(AzureField::Username)?;
    let password = resolver.field(AzureField::Password)?;
    let raw_port = resolver.field(AzureField::Port)?;
    let host = resolver.field(AzureField::Host)?;
    let database = resolver.field(AzureField::Database)?;

    let port: u16 = raw_port.trim().parse().map_err(|e| {
        ConnectorError::ConfigError(format!(
            "{} is not a valid port ({raw_port:?}): {e}",
            AzureField::Port.variable()
        ))
    })?;

    let url = render_url(
        &urlencoding::encode(&user),
        &urlencoding::encode(&password),
        &host,
        port,
        &database,
    );

    Ok(EngineDescriptor {
        url,
        user,
        password,
        host,
        port,
        database,
    })
}

/// [`build_engine_descriptor`] against the process environment, environment-only.
///
/// # Errors
/// See [`build_engine_descriptor`].
pub fn azure_engine_from_env(
    config: &ConnectionConfig,
) -> Result<EngineDescriptor, ConnectorError> {
    build_engine_descriptor(config, &ProcessEnv, ResolutionStrategy::EnvironmentOnly)
}
