//! Credential primitives.
//!
//! - PBKDF2-SHA256 password hashing (600k iterations, random 16-byte salt)
//! - HS256 access tokens
//! - opaque refresh tokens stored as SHA-256 digests

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::ServiceError;

const PBKDF2_ITERATIONS: u32 = 600_000;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

/// Access token lifetime: 1 hour.
pub const JWT_EXPIRY_SECS: u64 = 3600;

/// Refresh token lifetime: 7 days.
pub const REFRESH_EXPIRY_SECS: u64 = 7 * 24 * 3600;

const JWT_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

// ── Passwords ───────────────────────────────────────────────────────────────

/// A stored password: hex-encoded derived key and salt.
#[derive(Debug, Clone)]
pub struct PasswordHash {
    pub hash: String,
    pub salt: String,
}

pub fn hash_password(password: &str) -> Result<PasswordHash, ServiceError> {
    let salt = random_bytes::<SALT_LEN>()?;
    let derived = derive(password, &salt);
    Ok(PasswordHash {
        hash: hex::encode(derived),
        salt: hex::encode(salt),
    })
}

/// Well-formed credentials no password matches. Checking against them when an
/// email is unknown keeps failed logins equally slow either way.
pub const DECOY_HASH_HEX: &str = "0000000000000000000000000000000000000000000000000000000000000000";
pub const DECOY_SALT_HEX: &str = "00000000000000000000000000000000";

/// Check `password` against a stored hash/salt pair. Malformed hex never matches.
pub fn verify_password(password: &str, hash_hex: &str, salt_hex: &str) -> bool {
    let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(hash_hex)) else {
        return false;
    };
    constant_time_eq(&derive(password, &salt), &expected)
}

fn derive(password: &str, salt: &[u8]) -> [u8; HASH_LEN] {
    let mut out = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut out);
    out
}

// ── Access tokens ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: u64,
    exp: u64,
}

/// Sign an access token for `user_id`, valid for [`JWT_EXPIRY_SECS`].
pub fn sign_jwt(user_id: &str, secret: &str, now_unix: u64) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now_unix,
        exp: now_unix + JWT_EXPIRY_SECS,
    };
    // Serializing three plain fields cannot fail.
    let payload = serde_json::to_vec(&claims).unwrap_or_default();

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(JWT_HEADER),
        URL_SAFE_NO_PAD.encode(payload)
    );
    let signature = hmac_sha256(secret.as_bytes(), signing_input.as_bytes());
    format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature))
}

/// Verify signature and expiry; returns the subject (user id).
pub fn verify_jwt(token: &str, secret: &str, now_unix: u64) -> Result<String, ServiceError> {
    let unauthorized = |msg: &str| ServiceError::Unauthorized(msg.to_string());

    let mut parts = token.splitn(3, '.');
    let (Some(header), Some(payload), Some(signature)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(unauthorized("invalid token format"));
    };

    let expected = hmac_sha256(secret.as_bytes(), format!("{header}.{payload}").as_bytes());
    let actual = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| unauthorized("invalid token signature encoding"))?;
    if !constant_time_eq(&expected, &actual) {
        return Err(unauthorized("invalid token signature"));
    }

    let payload = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| unauthorized("invalid token payload encoding"))?;
    let claims: Claims =
        serde_json::from_slice(&payload).map_err(|_| unauthorized("invalid token payload"))?;

    if now_unix > claims.exp {
        return Err(unauthorized("token expired"));
    }
    Ok(claims.sub)
}

// ── Opaque tokens ───────────────────────────────────────────────────────────

/// 32 random bytes, hex-encoded. Used for refresh tokens and ephemeral secrets.
pub fn generate_token() -> Result<String, ServiceError> {
    Ok(hex::encode(random_bytes::<32>()?))
}

/// SHA-256 of a token, hex-encoded, for storage and lookup.
pub fn hash_token(token: &str) -> String {
    use sha2::Digest;
    hex::encode(Sha256::digest(token.as_bytes()))
}

// ── Internal ────────────────────────────────────────────────────────────────

fn random_bytes<const N: usize>() -> Result<[u8; N], ServiceError> {
    let mut buf = [0u8; N];
    getrandom::getrandom(&mut buf)
        .map_err(|e| ServiceError::Internal(format!("RNG failure: {e}")))?;
    Ok(buf)
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn decoy_credentials_are_well_formed() {
        // Malformed hex would skip the key derivation entirely.
        assert_eq!(hex::decode(DECOY_SALT_HEX).unwrap().len(), SALT_LEN);
        assert_eq!(hex::decode(DECOY_HASH_HEX).unwrap().len(), HASH_LEN);
        assert!(!verify_password("user1234", DECOY_HASH_HEX, DECOY_SALT_HEX));
        assert!(!verify_password("", DECOY_HASH_HEX, DECOY_SALT_HEX));
    }

    #[test]
    fn jwt_round_trip() {
        let token = sign_jwt("user-1", SECRET, 1_000);
        assert_eq!(verify_jwt(&token, SECRET, 1_500).unwrap(), "user-1");
    }

    #[test]
    fn jwt_rejects_expired_and_foreign_tokens() {
        let token = sign_jwt("user-1", SECRET, 1_000);
        let err = verify_jwt(&token, SECRET, 1_000 + JWT_EXPIRY_SECS + 1).unwrap_err();
        assert_eq!(err.message(), "token expired");

        assert!(verify_jwt(&token, "other-secret", 1_000).is_err());
        assert!(verify_jwt("not-a-token", SECRET, 1_000).is_err());
    }

    #[test]
    fn jwt_rejects_tampered_payload() {
        let token = sign_jwt("user-1", SECRET, 1_000);
        let forged_payload = URL_SAFE_NO_PAD.encode(r#"{"sub":"admin","iat":1000,"exp":99999}"#);
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = &forged_payload;
        assert!(verify_jwt(&parts.join("."), SECRET, 1_000).is_err());
    }

    #[test]
    fn password_hash_verifies_only_the_original() {
        let stored = hash_password("hunter22").unwrap();
        assert!(verify_password("hunter22", &stored.hash, &stored.salt));
        assert!(!verify_password("hunter23", &stored.hash, &stored.salt));
        assert!(!verify_password("hunter22", "zz", &stored.salt));
    }

    #[test]
    fn token_hash_is_stable_hex() {
        let token = generate_token().unwrap();
        assert_eq!(token.len(), 64);
        assert_eq!(hash_token(&token), hash_token(&token));
        assert_ne!(hash_token(&token), token);
    }
}
