//! Minimal AWS SigV4 request signing.
//!
//! The full signing algorithm is implemented locally with `sha2` and `hex` to
//! avoid pulling in the AWS SDK. Credentials come from the standard
//! environment variables; the region falls back to `us-east-1`.

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone)]
pub struct AwsCredentials {
    pub access_key: String,
    pub secret_key: String,
    pub session_token: Option<String>,
}

impl AwsCredentials {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(AwsCredentials {
            access_key: std::env::var("AWS_ACCESS_KEY_ID").context("AWS_ACCESS_KEY_ID not set")?,
            secret_key: std::env::var("AWS_SECRET_ACCESS_KEY")
                .context("AWS_SECRET_ACCESS_KEY not set")?,
            session_token: std::env::var("AWS_SESSION_TOKEN").ok(),
        })
    }
}

/// Region resolution: `AWS_DEFAULT_REGION`, then `AWS_REGION`, then us-east-1.
pub fn default_region() -> String {
    std::env::var("AWS_DEFAULT_REGION")
        .ok()
        .or_else(|| std::env::var("AWS_REGION").ok())
        .unwrap_or_else(|| "us-east-1".into())
}

/// A request to be signed. `path` must already be URI-encoded.
pub struct SignableRequest<'a> {
    pub method: &'a str,
    pub host: &'a str,
    pub path: &'a str,
    pub region: &'a str,
    pub service: &'a str,
    pub body: &'a [u8],
}

/// Sign a request and return the complete header set to attach, including
/// `host`, `x-amz-date`, `x-amz-content-sha256` and `Authorization`.
pub fn sign(
    creds: &AwsCredentials,
    req: &SignableRequest<'_>,
    now: DateTime<Utc>,
) -> Vec<(String, String)> {
    let date_time = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = date_time[..8].to_string();
    let body_hash = hex_sha256(req.body);

    let mut headers_to_sign: Vec<(String, String)> = vec![
        ("content-type".into(), "application/json".into()),
        ("host".into(), req.host.to_string()),
        ("x-amz-content-sha256".into(), body_hash.clone()),
        ("x-amz-date".into(), date_time.clone()),
    ];
    if let Some(token) = &creds.session_token {
        headers_to_sign.push(("x-amz-security-token".into(), token.clone()));
    }
    headers_to_sign.sort_by(|a, b| a.0.cmp(&b.0));

    let canonical_headers: String = headers_to_sign
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k, v.trim()))
        .collect();
    let signed_headers: String = headers_to_sign
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical_request = format!(
        "{}\n{}\n\n{}\n{}\n{}",
        req.method, req.path, canonical_headers, signed_headers, body_hash
    );

    let credential_scope = format!("{}/{}/{}/aws4_request", date, req.region, req.service);
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{}\n{}\n{}",
        date_time,
        credential_scope,
        hex_sha256(canonical_request.as_bytes())
    );

    let signing_key =
        derive_signing_key(creds.secret_key.as_bytes(), &date, req.region, req.service);
    let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

    let authorization = format!(
        "AWS4-HMAC-SHA256 Credential={}/{},SignedHeaders={},Signature={}",
        creds.access_key, credential_scope, signed_headers, signature
    );

    let mut headers = headers_to_sign;
    headers.push(("Authorization".into(), authorization));
    headers
}

/// Percent-encode a URI path segment, keeping `/` (appears in prefixes and
/// Bedrock model IDs).
pub fn uri_encode_path(s: &str) -> String {
    let mut out = String::with_capacity(s.len() * 2);
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(b as char)
            }
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

fn sha256(data: &[u8]) -> Vec<u8> {
    let mut h = Sha256::new();
    h.update(data);
    h.finalize().to_vec()
}

pub fn hex_sha256(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// HMAC-SHA256 computed without the `hmac` crate using the raw SHA256 primitive.
fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    const BLOCK: usize = 64;
    let norm_key = if key.len() > BLOCK {
        sha256(key)
    } else {
        key.to_vec()
    };
    let mut padded = [0u8; BLOCK];
    padded[..norm_key.len()].copy_from_slice(&norm_key);
    let ipad: Vec<u8> = padded.iter().map(|&b| b ^ 0x36).collect();
    let opad: Vec<u8> = padded.iter().map(|&b| b ^ 0x5c).collect();
    let inner = {
        let mut h = Sha256::new();
        h.update(&ipad);
        h.update(data);
        h.finalize().to_vec()
    };
    let mut h = Sha256::new();
    h.update(&opad);
    h.update(&inner);
    h.finalize().to_vec()
}

fn derive_signing_key(secret: &[u8], date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_secret = [b"AWS4", secret].concat();
    let k_date = hmac_sha256(&k_secret, date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn hmac_sha256_known_vector() {
        // HMAC-SHA256 test vector (RFC 4231 style)
        let key = b"key";
        let data = b"The quick brown fox jumps over the lazy dog";
        let result = hex::encode(hmac_sha256(key, data));
        assert_eq!(
            result,
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn derive_signing_key_is_deterministic() {
        let k1 = derive_signing_key(b"secret", "20240101", "us-east-1", "bedrock");
        let k2 = derive_signing_key(b"secret", "20240101", "us-east-1", "bedrock");
        assert_eq!(k1, k2);
        let k3 = derive_signing_key(b"secret", "20240102", "us-east-1", "bedrock");
        assert_ne!(k1, k3);
    }

    #[test]
    fn sign_emits_authorization_with_scope_and_signed_headers() {
        let creds = AwsCredentials {
            access_key: "AKID".into(),
            secret_key: "SECRET".into(),
            session_token: None,
        };
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let req = SignableRequest {
            method: "POST",
            host: "s3.us-east-1.amazonaws.com",
            path: "/bucket/key.json",
            region: "us-east-1",
            service: "s3",
            body: b"{}",
        };
        let headers = sign(&creds, &req, now);
        let auth = &headers
            .iter()
            .find(|(k, _)| k == "Authorization")
            .expect("authorization header")
            .1;
        assert!(auth.starts_with("AWS4-HMAC-SHA256 Credential=AKID/20240101/us-east-1/s3/aws4_request"));
        assert!(auth.contains("SignedHeaders=content-type;host;x-amz-content-sha256;x-amz-date"));
        assert!(headers.iter().any(|(k, _)| k == "x-amz-date"));
    }

    #[test]
    fn session_token_is_included_in_signed_headers() {
        let creds = AwsCredentials {
            access_key: "AKID".into(),
            secret_key: "SECRET".into(),
            session_token: Some("TOKEN".into()),
        };
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let req = SignableRequest {
            method: "GET",
            host: "example.amazonaws.com",
            path: "/",
            region: "us-east-1",
            service: "bedrock",
            body: b"",
        };
        let headers = sign(&creds, &req, now);
        assert!(headers.iter().any(|(k, v)| k == "x-amz-security-token" && v == "TOKEN"));
        let auth = &headers.iter().find(|(k, _)| k == "Authorization").unwrap().1;
        assert!(auth.contains("x-amz-security-token"));
    }

    #[test]
    fn uri_encoding_keeps_slashes_and_escapes_colons() {
        assert_eq!(uri_encode_path("model/us.claude:0"), "model/us.claude%3A0");
        assert_eq!(uri_encode_path("plain-path_ok~1"), "plain-path_ok~1");
    }
}
