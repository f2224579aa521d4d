//! Optimistic update helper

use std::future::Future;

use tokio::sync::RwLock;
use tracing::warn;

use crate::error::Result;

/// Apply a local change, confirm it remotely, and undo it on failure
///
/// `apply` runs under the write lock and returns whatever `revert` needs to
/// undo it. The lock is released before `remote` is awaited, so readers see
/// the optimistic value while the call is in flight. A failed `apply` never
/// reaches the backend.
pub async fn run_optimistic<S, U, T, Fut>(
    store: &RwLock<S>,
    operation: &str,
    apply: impl FnOnce(&mut S) -> Result<U>,
    remote: impl FnOnce() -> Fut,
    revert: impl FnOnce(&mut S, U),
) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    let undo = {
        let mut guard = store.write().await;
        apply(&mut *guard)?
    };

    match remote().await {
        Ok(value) => Ok(value),
        Err(err) => {
            warn!(operation, error = %err, "Remote update failed, reverting");
            let mut guard = store.write().await;
            revert(&mut *guard, undo);
            Err(err)
        }
    }
}
