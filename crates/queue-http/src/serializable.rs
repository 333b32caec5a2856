//! `[SERIALIZABLE_REQUEST]`: the lossless transform between a live
//! `reqwest::Request` and a storable [`RequestRecord`], and back.

use queue_core::request::{
    RequestCache, RequestCredentials, RequestMode, RequestRecord, RequestRedirect,
};

/// Capture a live `reqwest::Request` into a storable record.
///
/// Body capture only applies to methods that permit one (anything but
/// `GET`/`HEAD`). `reqwest::Body` only exposes its bytes when it was
/// constructed from an already-buffered source (`Vec<u8>`, `String`,
/// ...) rather than a streaming source; a streaming body can't be
/// captured for later replay since it's a one-shot stream, so this
/// crate's callers are expected to build failed requests with a
/// buffered body precisely so they can be queued.
pub fn to_record(request: &reqwest::Request) -> RequestRecord {
    let method = request.method().as_str().to_owned();
    let body = if RequestRecord::method_permits_body(&method) {
        request.body().and_then(|b| b.as_bytes()).map(|b| b.to_vec())
    } else {
        None
    };

    RequestRecord {
        url: request.url().to_string(),
        method,
        headers: request
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect(),
        body,
        mode: RequestMode::default(),
        credentials: RequestCredentials::default(),
        cache: RequestCache::default(),
        redirect: RequestRedirect::default(),
        referrer: None,
        integrity: None,
    }
}

/// Reconstruct a live `reqwest::Request` from a stored record. Every
/// captured field is reattached; `redirect`/`cache` have no first-class
/// `reqwest::Request` equivalent and are instead honored by the
/// `reqwest::Client` that builds the request (see `ReqwestReplayDriver`).
pub fn from_record(
    client: &reqwest::Client,
    record: &RequestRecord,
) -> Result<reqwest::Request, anyhow::Error> {
    let method = reqwest::Method::from_bytes(record.method.as_bytes())?;
    let mut builder = client.request(method, &record.url);

    let mut headers = reqwest::header::HeaderMap::new();
    for (name, value) in &record.headers {
        // `append`, not `insert`: a name repeated in `record.headers` (two
        // `Cookie` values, say) must produce two header lines, not have the
        // later one silently replace the earlier.
        headers.append(
            reqwest::header::HeaderName::try_from(name.as_str())?,
            reqwest::header::HeaderValue::try_from(value.as_str())?,
        );
    }
    builder = builder.headers(headers);

    if let Some(body) = &record.body {
        builder = builder.body(body.clone());
    }

    if let Some(referrer) = &record.referrer {
        if let Ok(value) = reqwest::header::HeaderValue::try_from(referrer.as_str()) {
            builder = builder.header(reqwest::header::REFERER, value);
        }
    }

    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_method_url_headers_and_body() {
        let client = reqwest::Client::new();
        let original = client
            .post("https://example.com/submit")
            .header("x-request-id", "abc-123")
            .header("content-type", "application/json")
            .body(br#"{"hello":"world"}"#.to_vec())
            .build()
            .unwrap();

        let record = to_record(&original);
        assert_eq!(record.url, "https://example.com/submit");
        assert_eq!(record.method, "POST");
        assert_eq!(record.body.as_deref(), Some(&br#"{"hello":"world"}"#[..]));
        assert!(record
            .headers
            .iter()
            .any(|(n, v)| n == "x-request-id" && v == "abc-123"));

        let rebuilt = from_record(&client, &record).unwrap();
        assert_eq!(rebuilt.url().as_str(), "https://example.com/submit");
        assert_eq!(rebuilt.method().as_str(), "POST");
        assert_eq!(
            rebuilt.body().and_then(|b| b.as_bytes()),
            Some(&br#"{"hello":"world"}"#[..])
        );
        assert_eq!(
            rebuilt.headers().get("x-request-id").unwrap(),
            "abc-123"
        );
    }

    #[test]
    fn get_requests_never_capture_a_body() {
        let client = reqwest::Client::new();
        let original = client.get("https://example.com/list").build().unwrap();
        let record = to_record(&original);
        assert!(record.body.is_none());
    }
}
