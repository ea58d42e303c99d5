//! Bitget v2 request signing.
//!
//! `ACCESS-SIGN` is the base64 HMAC-SHA256 of
//! `timestamp + METHOD + path[?query] + body` with a millisecond timestamp.
//! The socket login signs `seconds + "GET" + "/user/verify"` the same way.

use reqwest::Method;
use serde_json::json;

use crate::infrastructure::sign::hmac_sha256_base64;
use crate::infrastructure::HttpRequest;

const WS_VERIFY_PATH: &str = "/user/verify";

#[derive(Clone)]
pub struct BitgetSigner {
    api_key: String,
    secret_key: String,
    passphrase: String,
}

impl BitgetSigner {
    #[must_use]
    pub fn new(
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
        passphrase: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: secret_key.into(),
            passphrase: passphrase.into(),
        }
    }

    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    #[must_use]
    pub fn signature(&self, timestamp: i64, method: &Method, path_and_query: &str, body: &str) -> String {
        let prehash = format!("{timestamp}{}{path_and_query}{body}", method.as_str());
        hmac_sha256_base64(&self.secret_key, &prehash)
    }

    /// Attach the `ACCESS-*` headers to `request`.
    #[must_use]
    pub fn sign(&self, request: HttpRequest, timestamp: i64) -> HttpRequest {
        let signature = self.signature(
            timestamp,
            &request.method,
            &request.path_and_query(),
            request.body.as_deref().unwrap_or_default(),
        );
        request
            .header("ACCESS-KEY", self.api_key.clone())
            .header("ACCESS-SIGN", signature)
            .header("ACCESS-TIMESTAMP", timestamp.to_string())
            .header("ACCESS-PASSPHRASE", self.passphrase.clone())
            .header("Content-Type", "application/json")
            .header("locale", "en-US")
    }

    /// `op: login` frame for the private socket; `timestamp_secs` in seconds.
    #[must_use]
    pub fn login_frame(&self, timestamp_secs: i64) -> String {
        let sign = self.signature(timestamp_secs, &Method::GET, WS_VERIFY_PATH, "");
        json!({
            "op": "login",
            "args": [{
                "apiKey": self.api_key,
                "passphrase": self.passphrase,
                "timestamp": timestamp_secs.to_string(),
                "sign": sign,
            }]
        })
        .to_string()
    }
}
