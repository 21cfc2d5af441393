//! Request metadata extraction.

use axum::http::HeaderMap;
use axum::http::header::USER_AGENT;

use keygate_core::models::auth::DeviceFingerprint;

/// Derive the device fingerprint from `user-agent` and `x-forwarded-for`.
///
/// Missing headers become empty strings; the pair is treated as an opaque
/// session-binding key either way.
pub fn fingerprint_from_headers(headers: &HeaderMap) -> DeviceFingerprint {
    let ua = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    DeviceFingerprint::new(ua, ip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn extracts_both_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("curl/8"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9"));
        let fp = fingerprint_from_headers(&headers);
        assert_eq!(fp.ua, "curl/8");
        assert_eq!(fp.ip, "203.0.113.9");
    }

    #[test]
    fn missing_headers_become_empty() {
        let fp = fingerprint_from_headers(&HeaderMap::new());
        assert_eq!(fp, DeviceFingerprint::new("", ""));
    }
}
