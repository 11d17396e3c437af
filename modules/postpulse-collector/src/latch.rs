use std::sync::OnceLock;

use tracing::warn;

use postpulse_common::{CollectError, Provider, Result};

/// Remembers the first fatal error a collector saw. Once tripped, every later
/// call on that collector fails with the same error before any request goes out.
#[derive(Debug, Default)]
pub(crate) struct FatalLatch {
    tripped: OnceLock<CollectError>,
}

impl FatalLatch {
    pub(crate) fn check(&self) -> Result<()> {
        match self.tripped.get() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Pass `err` through, tripping the latch when it is fatal.
    pub(crate) fn observe(&self, provider: Provider, err: CollectError) -> CollectError {
        if err.is_fatal() && self.tripped.set(err.clone()).is_ok() {
            warn!(%provider, error = %err, "Collector disabled after fatal error");
        }
        err
    }

    pub(crate) fn guard<T>(&self, provider: Provider, result: Result<T>) -> Result<T> {
        result.map_err(|err| self.observe(provider, err))
    }
}
