use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Forge an HS256 token for tests. `ttl_secs` may be negative to produce an
/// already-expired token.
pub fn make_token(sub: &str, role: Option<&str>, secret: &str, ttl_secs: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);

    let now = chrono::Utc::now().timestamp();
    let claims = serde_json::json!({
        "sub": sub,
        "role": role,
        "iat": now,
        "exp": now + ttl_secs,
    });
    let claims_b64 = URL_SAFE_NO_PAD.encode(claims.to_string());

    let payload = format!("{}.{}", header, claims_b64);
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key size");
    mac.update(payload.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    format!("{}.{}", payload, signature)
}
