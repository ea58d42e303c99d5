//! Binance USDⓈ-M request signing.
//!
//! Parameters plus `timestamp` and `recvWindow` are key-sorted and
//! url-encoded; the hex HMAC-SHA256 of that string is appended as
//! `signature`. Everything travels in the query string for all methods.

use reqwest::Method;

use crate::infrastructure::sign::{encode_sorted_query, hmac_sha256_hex, Params};
use crate::infrastructure::HttpRequest;

pub const API_KEY_HEADER: &str = "X-MBX-APIKEY";
pub const RECV_WINDOW_MS: u64 = 5000;

#[derive(Clone)]
pub struct BinanceSigner {
    api_key: String,
    secret_key: String,
}

impl BinanceSigner {
    #[must_use]
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: secret_key.into(),
        }
    }

    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Canonical query including `timestamp`, `recvWindow` and `signature`.
    #[must_use]
    pub fn signed_query(&self, params: &Params, timestamp: i64) -> String {
        let mut all = params.clone();
        all.push(("timestamp".into(), timestamp.to_string()));
        all.push(("recvWindow".into(), RECV_WINDOW_MS.to_string()));

        let query = encode_sorted_query(&all);
        let signature = hmac_sha256_hex(&self.secret_key, &query);
        format!("{query}&signature={signature}")
    }

    #[must_use]
    pub fn sign(&self, method: Method, path: &str, params: &Params, timestamp: i64) -> HttpRequest {
        HttpRequest::new(method, path)
            .query(self.signed_query(params, timestamp))
            .header(API_KEY_HEADER, self.api_key.clone())
    }

    /// Request authorized by API key only (listenKey management).
    #[must_use]
    pub fn keyed(&self, method: Method, path: &str, params: &Params) -> HttpRequest {
        HttpRequest::new(method, path)
            .query(encode_sorted_query(params))
            .header(API_KEY_HEADER, self.api_key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::sign::params;

    #[test]
    fn test_signed_query_golden() {
        let signer = BinanceSigner::new("key", "secret");
        let p = params(&[("symbol", "BTCUSDT"), ("side", "BUY"), ("quantity", "0.01")]);

        let query = signer.signed_query(&p, 1_700_000_000_000);
        assert_eq!(
            query,
            "quantity=0.01&recvWindow=5000&side=BUY&symbol=BTCUSDT&timestamp=1700000000000\
             &signature=c35fb4c99969d36c506369a7aaafe118eb36ec36ae9247a2f42e9dbb174f1b37"
        );
    }

    #[test]
    fn test_api_key_header() {
        let signer = BinanceSigner::new("key", "secret");
        let req = signer.sign(Method::GET, "/fapi/v2/balance", &Params::new(), 1);
        assert_eq!(req.headers, vec![(API_KEY_HEADER, "key".to_string())]);
        assert!(req.query.starts_with("recvWindow=5000&timestamp=1&signature="));
    }
}
