use std::fmt;

use futures_util::future::BoxFuture;
use tracing::warn;

use crate::driver::Session;

/// A ready, authenticated connection.
///
/// Only [`crate::ConnectionFactory::open`] hands these out, and only after the post-connect
/// handshake succeeded. Dropping a connection drops the socket; [`Connection::close`] or
/// [`Connection::scoped`] end the session gracefully.
pub struct Connection<S: Session> {
    session: S,
}

impl<S: Session> fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

impl<S: Session> Connection<S> {
    pub(crate) fn new(session: S) -> Self {
        Self { session }
    }

    /// Borrow the underlying session to issue statements.
    pub fn cursor(&mut self) -> &mut S {
        &mut self.session
    }

    /// Close the session.
    ///
    /// # Errors
    /// Returns the driver error if the server did not acknowledge the close.
    pub async fn close(self) -> Result<(), S::Error> {
        self.session.close().await
    }

    /// Run `body` against this connection and close it afterwards, whether `body` succeeded
    /// or not.
    ///
    /// ```rust,no_run
    /// # async fn demo() -> Result<(), tiberius::error::Error> {
    /// use mssql_connector::prelude::*;
    ///
    /// let cfg =
    ///     ConnectionConfig::new("sa".into(), "pw".into(), "localhost".into(), "master".into());
    /// let conn = open(&cfg).await?;
    /// conn.scoped(|conn| {
    ///     Box::pin(async move { conn.cursor().execute_batch("SELECT 1").await })
    /// })
    /// .await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// Returns the error from `body` if it failed; otherwise the error from closing, if any.
    pub async fn scoped<F, T, E>(mut self, body: F) -> Result<T, E>
    where
        F: for<'c> FnOnce(&'c mut Self) -> BoxFuture<'c, Result<T, E>>,
        E: From<S::Error>,
    {
        let outcome = body(&mut self).await;
        let closed = self.close().await;
        match (outcome, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(close_err)) => Err(close_err.into()),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(close_err)) => {
                warn!("close after failed scope also failed: {}", close_err);
                Err(err)
            }
        }
    }
}
