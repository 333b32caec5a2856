//! `[NAME_REGISTRY]`: process-wide uniqueness of queue names.
//!
//! Generalizes `spin-resource-table`'s "bounded set of unique slots" idea
//! from integer keys to string names: a `Queue` name is the slot, and
//! there is no capacity limit or eventual reuse, since queue names are
//! meant to live for the process lifetime rather than be checked in and
//! out like a resource handle.

use std::collections::HashSet;
use std::sync::OnceLock;
use std::sync::Mutex;

use crate::error::QueueError;

fn registry() -> &'static Mutex<HashSet<String>> {
    static REGISTRY: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Register `name` as in use. Fails with [`QueueError::DuplicateQueueName`]
/// if another live `Queue` already holds it.
pub fn register(name: &str) -> Result<(), QueueError> {
    let mut names = registry().lock().expect("name registry mutex poisoned");
    if !names.insert(name.to_owned()) {
        return Err(QueueError::DuplicateQueueName(name.to_owned()));
    }
    Ok(())
}

/// Test-only: clear every registered name so a test suite can reuse names
/// across cases without constructing a fresh process.
#[cfg(any(test, feature = "test-util"))]
pub fn reset() {
    registry().lock().expect("name registry mutex poisoned").clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    // `registry()` is process-global, so these cases share one test binary
    // thread instead of running concurrently: otherwise one test's
    // `reset()` would yank names out from under another.
    #[test]
    fn duplicate_and_reset_behavior() {
        reset();
        register("a").unwrap();
        assert!(matches!(register("a"), Err(QueueError::DuplicateQueueName(n)) if n == "a"));

        reset();
        assert!(register("a").is_ok());
    }
}
