use std::sync::Arc;

/// Sink for the handshake's log lines.
///
/// The factory takes one of these explicitly instead of reaching for a global
/// logger; the process entry point decides where the lines end up.
pub trait ConnectionLogger: Send + Sync {
    fn info(&self, message: &str);
    fn warning(&self, message: &str);
}

/// Forwards to the `tracing` macros, so whatever subscriber the binary installed receives the
/// lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl ConnectionLogger for TracingLogger {
    fn info(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn warning(&self, message: &str) {
        tracing::warn!("{message}");
    }
}

impl<L: ConnectionLogger + ?Sized> ConnectionLogger for Arc<L> {
    fn info(&self, message: &str) {
        (**self).info(message);
    }

    fn warning(&self, message: &str) {
        (**self).warning(message);
    }
}
