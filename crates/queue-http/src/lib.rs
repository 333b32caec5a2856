//! Reqwest-backed pieces of the background-sync queue: the
//! `[SERIALIZABLE_REQUEST]` transform and a [`ReplayDriver`] that issues
//! real network requests.

mod replay_driver;
mod serializable;

pub use replay_driver::ReqwestReplayDriver;
pub use serializable::{from_record, to_record};
