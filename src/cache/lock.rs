use std::sync::{Mutex, MutexGuard};

use tracing::warn;

/// Acquire `lock`, recovering the guard if a previous holder panicked.
///
/// Cache contents stay structurally valid after a panic inside a producer,
/// so the worst case is a stale or missing entry.
pub(crate) fn mutex_lock<'a, T>(
    lock: &'a Mutex<T>,
    cache: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                op,
                cache,
                lock_kind = "mutex.lock",
                result = "poisoned_recovered",
                hint = "entry may be missing after panic in a producer",
                "Recovered from poisoned cache lock"
            );
            poisoned.into_inner()
        }
    }
}
