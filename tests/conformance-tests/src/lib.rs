//! This crate has no library surface of its own. See `tests/` for
//! end-to-end coverage exercising the real `queue-store-sqlite` and
//! `queue-sync` backends together, the integration-level complement to
//! each crate's own unit tests.
