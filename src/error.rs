use thiserror::Error;

use crate::azure::AzureField;

/// Errors raised while assembling connection settings.
///
/// The connection factory itself never produces this type: failures during
/// `open` surface as the driver's own error (see [`crate::driver::Driver`]).
/// The `From` conversion for `tiberius` errors lets callers fold both paths
/// into one error with `?`.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error(transparent)]
    MssqlError(#[from] tiberius::error::Error),

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("missing {field}: set the {} environment variable", .field.variable())]
    MissingField { field: AzureField },
}
