use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use uuid::Uuid;

/// Bytes of entropy in every opaque credential.
pub const TOKEN_BYTES: usize = 32;

/// 256-bit random value, base64url encoded without padding.
///
/// Used for session tokens, authorization codes, access/refresh tokens,
/// generated client secrets and the login `state` parameter.
pub fn generate_secure_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn generate_client_id() -> String {
    Uuid::new_v4().to_string()
}
