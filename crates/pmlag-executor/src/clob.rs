//! Polymarket CLOB REST client.
//!
//! Authenticated endpoints use L2 headers: an HMAC-SHA256 over
//! `timestamp + method + path + body`, keyed with the API secret. API
//! credentials can be derived from the trading key through the L1
//! (EIP-712 `ClobAuth`) endpoints.

use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use hmac::{Hmac, Mac};
use pmlag_core::{InstrumentId, OrderSide, Price};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::config::VenueConfig;
use crate::error::{ExecutorError, ExecutorResult, VenueError, VenueResult};
use crate::signer::OrderSigner;
use crate::venue::{BoxFuture, OrderArgs, SignedOrder, VenueClient};

type HmacSha256 = Hmac<Sha256>;

/// L2 API credentials.
#[derive(Clone, Deserialize)]
pub struct ApiCredentials {
    #[serde(rename = "apiKey")]
    pub api_key: String,
    pub secret: String,
    pub passphrase: String,
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &self.api_key)
            .finish_non_exhaustive()
    }
}

/// L2 request signature: URL-safe base64 of HMAC-SHA256 over
/// `timestamp + method + path + body`.
pub fn l2_signature(
    secret: &str,
    timestamp: i64,
    method: &str,
    path: &str,
    body: &str,
) -> VenueResult<String> {
    let key = URL_SAFE
        .decode(secret)
        .or_else(|_| URL_SAFE_NO_PAD.decode(secret))
        .or_else(|_| STANDARD.decode(secret))
        .map_err(|e| VenueError::Signing(format!("API secret is not base64: {e}")))?;

    let mut mac = HmacSha256::new_from_slice(&key)
        .map_err(|e| VenueError::Signing(format!("HMAC key error: {e}")))?;
    mac.update(format!("{timestamp}{method}{path}{body}").as_bytes());
    Ok(URL_SAFE.encode(mac.finalize().into_bytes()))
}

fn header_map(pairs: &[(&'static str, String)]) -> VenueResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        let value = HeaderValue::from_str(value)
            .map_err(|e| VenueError::Signing(format!("invalid header {name}: {e}")))?;
        headers.insert(HeaderName::from_static(name), value);
    }
    Ok(headers)
}

fn http_client(config: &VenueConfig) -> ExecutorResult<Client> {
    Client::builder()
        .timeout(config.request_timeout())
        .build()
        .map_err(|e| ExecutorError::ClientSetup(e.to_string()))
}

async fn read_json(response: reqwest::Response) -> VenueResult<Value> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| VenueError::Http(e.to_string()))?;
    if !status.is_success() {
        return Err(VenueError::Status {
            status: status.as_u16(),
            body: text,
        });
    }
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|e| VenueError::Decode(format!("{e}: {text}")))
}

/// Derive (or create) L2 credentials for the signer's key.
///
/// Tries `GET /auth/derive-api-key` first, then `POST /auth/api-key`.
pub async fn derive_api_credentials(
    config: &VenueConfig,
    signer: &OrderSigner,
) -> ExecutorResult<ApiCredentials> {
    let http = http_client(config)?;
    let host = config.host.trim_end_matches('/');
    let nonce = 0u64;

    let mut last_error = None;
    for (method, path) in [
        (Method::GET, "/auth/derive-api-key"),
        (Method::POST, "/auth/api-key"),
    ] {
        let timestamp = chrono::Utc::now().timestamp();
        let signature = signer.sign_clob_auth(timestamp, nonce).await?;
        let headers = header_map(&[
            ("poly_address", signer.signer_address().to_checksum(None)),
            ("poly_signature", signature),
            ("poly_timestamp", timestamp.to_string()),
            ("poly_nonce", nonce.to_string()),
        ])?;

        let result = match http
            .request(method.clone(), format!("{host}{path}"))
            .headers(headers)
            .send()
            .await
        {
            Ok(response) => read_json(response).await,
            Err(e) => Err(VenueError::Http(e.to_string())),
        };

        match result.and_then(|v| {
            serde_json::from_value::<ApiCredentials>(v).map_err(|e| VenueError::Decode(e.to_string()))
        }) {
            Ok(creds) => {
                info!(%path, api_key = %creds.api_key, "API credentials derived");
                return Ok(creds);
            }
            Err(e) => {
                warn!(%path, error = %e, "API credential request failed");
                last_error = Some(e);
            }
        }
    }

    Err(ExecutorError::Venue(last_error.unwrap_or_else(|| {
        VenueError::Http("no credential endpoint answered".to_string())
    })))
}

/// Authenticated CLOB client.
pub struct ClobClient {
    http: Client,
    host: String,
    signer: OrderSigner,
    creds: ApiCredentials,
}

impl ClobClient {
    pub fn new(config: &VenueConfig, signer: OrderSigner, creds: ApiCredentials) -> ExecutorResult<Self> {
        Ok(Self {
            http: http_client(config)?,
            host: config.host.trim_end_matches('/').to_string(),
            signer,
            creds,
        })
    }

    fn l2_headers(&self, method: &Method, path: &str, body: &str) -> VenueResult<HeaderMap> {
        let timestamp = chrono::Utc::now().timestamp();
        let signature = l2_signature(&self.creds.secret, timestamp, method.as_str(), path, body)?;
        header_map(&[
            ("poly_address", self.signer.signer_address().to_checksum(None)),
            ("poly_signature", signature),
            ("poly_timestamp", timestamp.to_string()),
            ("poly_api_key", self.creds.api_key.clone()),
            ("poly_passphrase", self.creds.passphrase.clone()),
        ])
    }

    async fn authenticated(&self, method: Method, path: &str, body: Option<Value>) -> VenueResult<Value> {
        let body = match body {
            Some(value) => serde_json::to_string(&value).map_err(|e| VenueError::Decode(e.to_string()))?,
            None => String::new(),
        };
        let headers = self.l2_headers(&method, path, &body)?;
        debug!(method = %method, %path, "CLOB request");

        let mut request = self
            .http
            .request(method, format!("{}{}", self.host, path))
            .headers(headers);
        if !body.is_empty() {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .body(body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| VenueError::Http(e.to_string()))?;
        read_json(response).await
    }
}

impl VenueClient for ClobClient {
    fn create_order(&self, args: OrderArgs) -> BoxFuture<'_, VenueResult<SignedOrder>> {
        Box::pin(async move {
            let payload = self.signer.sign_order(&args).await?;
            Ok(SignedOrder { args, payload })
        })
    }

    fn post_order(&self, order: SignedOrder) -> BoxFuture<'_, VenueResult<Value>> {
        Box::pin(async move {
            let body = json!({
                "order": order.payload,
                "owner": self.creds.api_key,
                "orderType": "GTC",
            });
            self.authenticated(Method::POST, "/order", Some(body)).await
        })
    }

    fn get_order_status(&self, order_id: String) -> BoxFuture<'_, VenueResult<Value>> {
        Box::pin(async move {
            let path = format!("/data/order/{order_id}");
            self.authenticated(Method::GET, &path, None).await
        })
    }

    fn cancel_order(&self, order_id: String) -> BoxFuture<'_, VenueResult<bool>> {
        Box::pin(async move {
            let response = self
                .authenticated(Method::DELETE, "/order", Some(json!({ "orderID": order_id })))
                .await?;
            Ok(cancel_confirmed(&response, &order_id))
        })
    }

    fn get_quote(&self, instrument: InstrumentId, side: OrderSide) -> BoxFuture<'_, VenueResult<Price>> {
        Box::pin(async move {
            let response = self
                .http
                .get(format!("{}/price", self.host))
                .query(&[("token_id", instrument.as_str()), ("side", side.as_str())])
                .send()
                .await
                .map_err(|e| VenueError::Http(e.to_string()))?;
            let value = read_json(response).await?;
            parse_quote(&value)
        })
    }
}

/// `true` when the cancel response lists `order_id` as cancelled.
fn cancel_confirmed(response: &Value, order_id: &str) -> bool {
    response
        .get("canceled")
        .or_else(|| response.get("cancelled"))
        .and_then(Value::as_array)
        .is_some_and(|ids| ids.iter().any(|id| id.as_str() == Some(order_id)))
}

fn parse_quote(value: &Value) -> VenueResult<Price> {
    let raw = value
        .get("price")
        .ok_or_else(|| VenueError::Decode(format!("quote without price: {value}")))?;
    let text = match raw {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => return Err(VenueError::Decode(format!("unexpected price: {other}"))),
    };
    Price::from_str(&text).map_err(|e| VenueError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_l2_signature_is_urlsafe_and_stable() {
        // "secret-key-bytes" as URL-safe base64.
        let secret = URL_SAFE.encode(b"secret-key-bytes");
        let a = l2_signature(&secret, 1_700_000_000, "POST", "/order", "{}").unwrap();
        let b = l2_signature(&secret, 1_700_000_000, "POST", "/order", "{}").unwrap();
        assert_eq!(a, b);
        assert!(!a.contains('+') && !a.contains('/'));
        assert_ne!(a, l2_signature(&secret, 1_700_000_001, "POST", "/order", "{}").unwrap());
    }

    #[test]
    fn test_l2_signature_accepts_unpadded_secret() {
        let padded = URL_SAFE.encode(b"abcd1");
        let unpadded = URL_SAFE_NO_PAD.encode(b"abcd1");
        assert_eq!(
            l2_signature(&padded, 1, "GET", "/x", "").unwrap(),
            l2_signature(&unpadded, 1, "GET", "/x", "").unwrap()
        );
        assert!(l2_signature("***", 1, "GET", "/x", "").is_err());
    }

    #[test]
    fn test_cancel_confirmed() {
        let response = json!({ "canceled": ["0xabc"], "not_canceled": {} });
        assert!(cancel_confirmed(&response, "0xabc"));
        assert!(!cancel_confirmed(&response, "0xdef"));
        assert!(!cancel_confirmed(&json!({ "not_canceled": { "0xabc": "gone" } }), "0xabc"));
    }

    #[test]
    fn test_parse_quote() {
        assert_eq!(parse_quote(&json!({ "price": "0.55" })).unwrap(), Price::new(dec!(0.55)));
        assert_eq!(parse_quote(&json!({ "price": 0.4 })).unwrap(), Price::new(dec!(0.4)));
        assert!(parse_quote(&json!({})).is_err());
    }

    #[test]
    fn test_credentials_debug_hides_secret() {
        let creds: ApiCredentials = serde_json::from_value(json!({
            "apiKey": "key",
            "secret": "s3cr3t",
            "passphrase": "pass",
        }))
        .unwrap();
        let shown = format!("{creds:?}");
        assert!(shown.contains("key"));
        assert!(!shown.contains("s3cr3t"));
    }
}
