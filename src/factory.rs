use crate::config::ConnectionConfig;
use crate::connection::Connection;
use crate::driver::{Driver, Session, TiberiusDriver, TiberiusSession};
use crate::logging::{ConnectionLogger, TracingLogger};
use crate::retry::RetryPolicy;

/// Header logged before any non-fatal session warnings.
pub const SESSION_WARNING_HEADER: &str =
    "Encountered non-fatal errors when configuring session that could impact performance:";

/// Opens connections through a [`Driver`], retrying the connect + handshake pair.
///
/// ```rust,no_run
/// # async fn demo() -> Result<(), tiberius::error::Error> {
/// use mssql_connector::prelude::*;
///
/// let factory = ConnectionFactory::new(TiberiusDriver::new())
///     .with_session_statement("SET ANSI_WARNINGS ON");
/// let cfg = ConnectionConfig::from_json_str(
///     r#"{"user":"sa","password":"pw","host":"localhost","database":"master"}"#,
/// ).expect("valid config");
/// let conn = factory.open(&cfg).await?;
/// conn.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionFactory<D, L = TracingLogger> {
    driver: D,
    logger: L,
    policy: RetryPolicy,
    session_statements: Vec<String>,
}

impl<D: Driver> ConnectionFactory<D> {
    #[must_use]
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            logger: TracingLogger,
            policy: RetryPolicy::default(),
            session_statements: Vec::new(),
        }
    }
}

impl<D: Driver, L: ConnectionLogger> ConnectionFactory<D, L> {
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_logger<L2: ConnectionLogger>(self, logger: L2) -> ConnectionFactory<D, L2> {
        ConnectionFactory {
            driver: self.driver,
            logger,
            policy: self.policy,
            session_statements: self.session_statements,
        }
    }

    /// Add a statement to run on every new session before it is handed out.
    #[must_use]
    pub fn with_session_statement(mut self, statement: impl Into<String>) -> Self {
        self.session_statements.push(statement.into());
        self
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Open a connection, retrying per the factory's policy.
    ///
    /// # Errors
    /// Returns the driver error from the last attempt once the retry budget is spent.
    pub async fn open(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Connection<D::Session>, D::Error> {
        self.policy
            .retry_logged(&self.logger, move || self.attempt(config))
            .await
    }

    async fn attempt(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Connection<D::Session>, D::Error> {
        let args = config.driver_args();
        let session = self.driver.connect(&args).await?;
        let mut connection = Connection::new(session);

        if let Err(err) = self.handshake(&mut connection).await {
            if let Err(close_err) = connection.close().await {
                self.logger
                    .warning(&format!("closing session after failed handshake: {close_err}"));
            }
            return Err(err);
        }
        Ok(connection)
    }

    async fn handshake(&self, connection: &mut Connection<D::Session>) -> Result<(), D::Error> {
        let session = connection.cursor();
        for statement in &self.session_statements {
            session.execute_batch(statement).await?;
        }

        let warnings = session.take_warnings();
        if !warnings.is_empty() {
            self.logger.info(SESSION_WARNING_HEADER);
            for warning in &warnings {
                self.logger.warning(warning);
            }
        }
        Ok(())
    }
}

/// Open a SQL Server connection with the default Tiberius driver, retry policy and logger.
///
/// # Errors
/// Returns the Tiberius error from the last attempt if all 5 attempts fail.
pub async fn open(
    config: &ConnectionConfig,
) -> Result<Connection<TiberiusSession>, tiberius::error::Error> {
    ConnectionFactory::new(TiberiusDriver::new()).open(config).await
}
