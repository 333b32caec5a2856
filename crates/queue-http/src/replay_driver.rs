//! A [`queue_core::ReplayDriver`] backed by a real `reqwest::Client`,
//! reusing a pooled client the way a connection pool is meant to be used,
//! generalized from "forward one guest request" to "replay one stored
//! [`RequestRecord`]".

use async_trait::async_trait;
use queue_core::error::ReplayError;
use queue_core::replay::ReplayDriver;
use queue_core::request::{RequestRecord, RequestRedirect};
use reqwest::Client;

use crate::serializable::from_record;

/// Issues each replayed request over a pooled `reqwest::Client`.
///
/// `redirect`/`cache` are captured losslessly in the [`RequestRecord`]
/// (for fidelity and for hosts that interpret them themselves), but a
/// `reqwest::Client`'s redirect policy is fixed at client-construction
/// time, not per-request, so this driver keeps two pooled clients, one
/// per redirect policy that actually changes request-time behavior, and
/// picks between them. `cache` has no `reqwest` equivalent at all (there
/// is no local HTTP cache to consult) and is preserved for interop but
/// not enforced here; this simplification is recorded in DESIGN.md.
pub struct ReqwestReplayDriver {
    follow_redirects: Client,
    no_redirects: Client,
}

impl ReqwestReplayDriver {
    pub fn new() -> Result<Self, anyhow::Error> {
        Ok(Self {
            follow_redirects: Client::builder().build()?,
            no_redirects: Client::builder()
                .redirect(reqwest::redirect::Policy::none())
                .build()?,
        })
    }

    fn client_for(&self, redirect: RequestRedirect) -> &Client {
        match redirect {
            RequestRedirect::Follow => &self.follow_redirects,
            RequestRedirect::Error | RequestRedirect::Manual => &self.no_redirects,
        }
    }
}

impl Default for ReqwestReplayDriver {
    fn default() -> Self {
        Self::new().expect("default reqwest client configuration is always valid")
    }
}

#[async_trait]
impl ReplayDriver for ReqwestReplayDriver {
    async fn fetch(&self, record: &RequestRecord) -> Result<(), ReplayError> {
        let client = self.client_for(record.redirect);
        let request = from_record(client, record).map_err(ReplayError::Fetch)?;

        tracing::trace!(url = %record.url, method = %record.method, "replaying request");

        // Matching the Fetch API this crate mirrors: an HTTP response
        // with an error status (4xx/5xx) still *resolves* `fetch`; only
        // a network-level failure rejects. So only `Err` from `execute`
        // counts as a replay failure; the response status is not
        // inspected here.
        client
            .execute(request)
            .await
            .map(|_response| ())
            .map_err(|err| ReplayError::Fetch(log_reqwest_error(err)))
    }
}

fn log_reqwest_error(err: reqwest::Error) -> anyhow::Error {
    let kind = if err.is_timeout() {
        "timeout"
    } else if err.is_connect() {
        "connect"
    } else if err.is_body() || err.is_decode() {
        "body"
    } else if err.is_request() {
        "request"
    } else {
        "other"
    };
    tracing::warn!(url = ?err.url(), kind, "replay fetch failed: {err}");
    anyhow::Error::new(err)
}
