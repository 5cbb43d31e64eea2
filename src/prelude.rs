//! Convenient imports for common functionality.

pub use crate::azure::{
    EngineDescriptor, EnvSource, ProcessEnv, ResolutionStrategy, build_engine_descriptor,
};
pub use crate::config::{ConnectionConfig, DriverArgs};
pub use crate::connection::Connection;
pub use crate::driver::{Driver, MssqlClient, Session, TiberiusDriver, TiberiusSession};
pub use crate::error::ConnectorError;
pub use crate::factory::{ConnectionFactory, open};
pub use crate::logging::{ConnectionLogger, TracingLogger};
pub use crate::retry::RetryPolicy;
