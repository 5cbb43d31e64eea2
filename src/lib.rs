//! Resilient SQL Server connections for data extraction.
//!
//! [`ConnectionFactory`] opens a Tiberius session, runs a post-connect handshake and retries the
//! pair with bounded exponential backoff. [`azure::build_engine_descriptor`] assembles the
//! connection URL for the Azure SQL variant.

pub mod azure;
pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
pub mod factory;
pub mod logging;
pub mod prelude;
pub mod retry;

pub use azure::{EngineDescriptor, ResolutionStrategy, build_engine_descriptor};
pub use config::{ConnectionConfig, DriverArgs};
pub use connection::Connection;
pub use driver::{Driver, MssqlClient, Session, TiberiusDriver, TiberiusSession};
pub use error::ConnectorError;
pub use factory::{ConnectionFactory, open};
pub use logging::{ConnectionLogger, TracingLogger};
pub use retry::RetryPolicy;
