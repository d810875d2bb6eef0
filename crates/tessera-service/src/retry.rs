//! Retry-once wrapper for store calls

use std::future::Future;

use tessera_core::StorageError;
use tracing::warn;

/// Run a store operation, repeating it once if the first attempt failed
/// transiently. A second failure, or any non-transient one, is returned.
pub(crate) async fn with_retry<T, F, Fut>(operation: &'static str, mut call: F) -> Result<T, StorageError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StorageError>>,
{
    match call().await {
        Err(err) if err.is_transient() => {
            warn!(operation, error = %err, "Transient storage failure, retrying once");
            call().await
        }
        result => result,
    }
}
