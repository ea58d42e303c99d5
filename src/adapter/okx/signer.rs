//! OKX v5 request signing.
//!
//! `OK-ACCESS-SIGN` is the base64 HMAC-SHA256 of
//! `timestamp + METHOD + path[?query] + body`, where the timestamp is an
//! RFC 3339 UTC instant with millisecond precision. The socket login signs
//! `seconds + "GET" + "/users/self/verify"`.

use chrono::{SecondsFormat, TimeZone, Utc};
use reqwest::Method;
use serde_json::json;

use crate::infrastructure::sign::hmac_sha256_base64;
use crate::infrastructure::HttpRequest;

const WS_VERIFY_PATH: &str = "/users/self/verify";

/// `1700000000000` -> `2023-11-14T22:13:20.000Z`.
#[must_use]
pub fn iso_timestamp(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|at| at.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}

#[derive(Clone)]
pub struct OkxSigner {
    api_key: String,
    secret_key: String,
    passphrase: String,
    /// Demo trading flag sent as `x-simulated-trading: 1`.
    simulated: bool,
}

impl OkxSigner {
    #[must_use]
    pub fn new(
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
        passphrase: impl Into<String>,
        simulated: bool,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: secret_key.into(),
            passphrase: passphrase.into(),
            simulated,
        }
    }

    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    #[must_use]
    pub fn signature(&self, timestamp: &str, method: &Method, path_and_query: &str, body: &str) -> String {
        let prehash = format!("{timestamp}{}{path_and_query}{body}", method.as_str());
        hmac_sha256_base64(&self.secret_key, &prehash)
    }

    /// Attach the `OK-ACCESS-*` headers; `timestamp_ms` is unix milliseconds.
    #[must_use]
    pub fn sign(&self, request: HttpRequest, timestamp_ms: i64) -> HttpRequest {
        let timestamp = iso_timestamp(timestamp_ms);
        let signature = self.signature(
            &timestamp,
            &request.method,
            &request.path_and_query(),
            request.body.as_deref().unwrap_or_default(),
        );
        let request = request
            .header("OK-ACCESS-KEY", self.api_key.clone())
            .header("OK-ACCESS-SIGN", signature)
            .header("OK-ACCESS-TIMESTAMP", timestamp)
            .header("OK-ACCESS-PASSPHRASE", self.passphrase.clone())
            .header("Content-Type", "application/json");
        if self.simulated {
            request.header("x-simulated-trading", "1")
        } else {
            request
        }
    }

    #[must_use]
    pub fn login_frame(&self, timestamp_secs: i64) -> String {
        let timestamp = timestamp_secs.to_string();
        let sign = self.signature(&timestamp, &Method::GET, WS_VERIFY_PATH, "");
        json!({
            "op": "login",
            "args": [{
                "apiKey": self.api_key,
                "passphrase": self.passphrase,
                "timestamp": timestamp,
                "sign": sign,
            }]
        })
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso_timestamp() {
        assert_eq!(iso_timestamp(1_700_000_000_000), "2023-11-14T22:13:20.000Z");
        assert_eq!(iso_timestamp(1_700_000_000_123), "2023-11-14T22:13:20.123Z");
    }

    #[test]
    fn test_rest_signature_golden() {
        let signer = OkxSigner::new("key", "secret", "phrase", false);
        let request = HttpRequest::new(Method::GET, "/api/v5/account/balance").query("ccy=USDT");
        let signed = signer.sign(request, 1_700_000_000_000);

        let sign = signed
            .headers
            .iter()
            .find(|(k, _)| *k == "OK-ACCESS-SIGN")
            .map(|(_, v)| v.as_str());
        assert_eq!(sign, Some("DSXVJCn8pWzPXcNGoxnj8NVaZJj6e5R/JsbjzsKNHHA="));
        assert!(!signed.headers.iter().any(|(k, _)| *k == "x-simulated-trading"));
    }

    #[test]
    fn test_simulated_header() {
        let signer = OkxSigner::new("key", "secret", "phrase", true);
        let signed = signer.sign(HttpRequest::new(Method::GET, "/api/v5/account/balance"), 0);
        assert!(signed
            .headers
            .contains(&("x-simulated-trading", "1".to_string())));
    }

    #[test]
    fn test_login_frame_golden() {
        let signer = OkxSigner::new("key", "secret", "phrase", false);
        let frame: serde_json::Value = serde_json::from_str(&signer.login_frame(1_700_000_000)).unwrap();
        assert_eq!(frame["args"][0]["sign"], "lhmJXK08fk9SI1ZwFXKFRrPtzfbNOwC+D1xMJJ/1KZg=");
        assert_eq!(frame["args"][0]["timestamp"], "1700000000");
    }
}
