//! OAuth 1.0a request signing (HMAC-SHA1), as required by the Trovebox API.

use base64::Engine as _;
use rand::distributions::Alphanumeric;
use rand::Rng as _;
use reqwest::{Method, Url};
use ring::hmac;

const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const VERSION: &str = "1.0";

/// Consumer and access-token pair issued by a Trovebox site for one app.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthCredentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub token: String,
    pub token_secret: String,
}

impl std::fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"<redacted>")
            .field("token", &"<redacted>")
            .field("token_secret", &"<redacted>")
            .finish()
    }
}

fn encode(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

/// `scheme://host[:port]/path` with the default port dropped.
fn base_string_uri(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    match url.port() {
        Some(port) => format!("{}://{}:{}{}", url.scheme(), host, port, url.path()),
        None => format!("{}://{}{}", url.scheme(), host, url.path()),
    }
}

impl OAuthCredentials {
    /// `Authorization` header value for a request, with a fresh nonce and
    /// the current time.
    pub fn authorization(&self, method: &Method, url: &Url) -> String {
        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let timestamp = chrono::Utc::now().timestamp();
        self.authorization_with(method, url, &nonce, timestamp)
    }

    fn protocol_params(&self, nonce: &str, timestamp: i64) -> Vec<(&'static str, String)> {
        vec![
            ("oauth_consumer_key", self.consumer_key.clone()),
            ("oauth_nonce", nonce.to_string()),
            ("oauth_signature_method", SIGNATURE_METHOD.to_string()),
            ("oauth_timestamp", timestamp.to_string()),
            ("oauth_token", self.token.clone()),
            ("oauth_version", VERSION.to_string()),
        ]
    }

    fn authorization_with(
        &self,
        method: &Method,
        url: &Url,
        nonce: &str,
        timestamp: i64,
    ) -> String {
        let mut params = self.protocol_params(nonce, timestamp);
        let signature = self.signature(&signature_base(method, url, &params));
        params.push(("oauth_signature", signature));
        params.sort();

        let fields = params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, encode(v)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("OAuth {fields}")
    }

    fn signature(&self, base: &str) -> String {
        let key = format!(
            "{}&{}",
            encode(&self.consumer_secret),
            encode(&self.token_secret)
        );
        let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, key.as_bytes());
        let tag = hmac::sign(&key, base.as_bytes());
        base64::engine::general_purpose::STANDARD.encode(tag.as_ref())
    }
}

/// The signature base string: method, base URI and the sorted, encoded
/// union of query and protocol parameters.
fn signature_base(method: &Method, url: &Url, protocol: &[(&'static str, String)]) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (encode(&k), encode(&v)))
        .chain(protocol.iter().map(|(k, v)| (encode(k), encode(v))))
        .collect();
    pairs.sort();
    let normalized = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.as_str(),
        encode(&base_string_uri(url)),
        encode(&normalized)
    )
}
