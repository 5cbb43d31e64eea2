// driver.rs - the seam between the connection factory and a concrete driver
//! Driver and session traits plus the production implementation over Tiberius.

use std::fmt;

use async_trait::async_trait;
use tiberius::Client;
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

use crate::config::DriverArgs;

/// Type alias for the Tiberius client over a tokio TCP stream
pub type MssqlClient = Client<Compat<TcpStream>>;

/// A low-level database session as produced by a [`Driver`].
#[async_trait]
pub trait Session: Send + Sized {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Run one batch of statements, discarding any rows.
    async fn execute_batch(&mut self, sql: &str) -> Result<(), Self::Error>;

    /// Drain the non-fatal messages the server reported since the last call.
    fn take_warnings(&mut self) -> Vec<String>;

    /// Close the session gracefully.
    async fn close(self) -> Result<(), Self::Error>;
}

/// Opens sessions. One call to `connect` is one attempt; retrying is the factory's job.
#[async_trait]
pub trait Driver: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;
    type Session: Session<Error = Self::Error>;

    async fn connect(&self, args: &DriverArgs) -> Result<Self::Session, Self::Error>;
}

/// SQL Server driver backed by Tiberius.
#[derive(Debug, Clone)]
pub struct TiberiusDriver {
    trust_cert: bool,
}

impl Default for TiberiusDriver {
    fn default() -> Self {
        Self { trust_cert: true }
    }
}

impl TiberiusDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept the server certificate without validation. On by default.
    #[must_use]
    pub fn trust_cert(mut self, trust_cert: bool) -> Self {
        self.trust_cert = trust_cert;
        self
    }
}

async fn open_tcp(addr: &str) -> Result<Compat<TcpStream>, tiberius::error::Error> {
    let tcp = TcpStream::connect(addr)
        .await
        .map_err(|e| tiberius::error::Error::Io {
            kind: e.kind(),
            message: format!("TCP connection error: {e}"),
        })?;
    tcp.set_nodelay(true)?;
    Ok(tcp.compat_write())
}

#[async_trait]
impl Driver for TiberiusDriver {
    type Error = tiberius::error::Error;
    type Session = TiberiusSession;

    async fn connect(&self, args: &DriverArgs) -> Result<TiberiusSession, tiberius::error::Error> {
        let mut config = args.to_tiberius_config(self.trust_cert)?;
        let addr = config.get_addr();
        debug!("connecting to {} as {}", addr, args.user);

        let tcp = open_tcp(&addr).await?;
        let client = match Client::connect(config.clone(), tcp).await {
            Ok(client) => client,
            // Azure SQL gateways may redirect the login to another node.
            Err(tiberius::error::Error::Routing { host, port }) => {
                info!("server redirected login to {}:{}", host, port);
                config.host(&host);
                config.port(port);
                let tcp = open_tcp(&config.get_addr()).await?;
                Client::connect(config, tcp).await?
            }
            Err(e) => return Err(e),
        };

        Ok(TiberiusSession { client })
    }
}

/// Live Tiberius session.
pub struct TiberiusSession {
    client: MssqlClient,
}

impl fmt::Debug for TiberiusSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TiberiusSession").finish_non_exhaustive()
    }
}

impl TiberiusSession {
    /// Direct access to the Tiberius client for running queries.
    pub fn client(&mut self) -> &mut MssqlClient {
        &mut self.client
    }
}

#[async_trait]
impl Session for TiberiusSession {
    type Error = tiberius::error::Error;

    async fn execute_batch(&mut self, sql: &str) -> Result<(), tiberius::error::Error> {
        self.client.simple_query(sql).await?.into_results().await?;
        Ok(())
    }

    fn take_warnings(&mut self) -> Vec<String> {
        // Tiberius reports INFO tokens through its own tracing events and does not buffer them.
        Vec::new()
    }

    async fn close(self) -> Result<(), tiberius::error::Error> {
        self.client.close().await
    }
}
