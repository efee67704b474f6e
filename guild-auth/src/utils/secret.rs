use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Newtype for a plaintext client secret to prevent accidental logging
#[derive(Clone)]
pub struct ClientSecret(String);

impl ClientSecret {
    pub fn new(secret: String) -> Self {
        Self(secret)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ClientSecret([REDACTED])")
    }
}

/// Newtype for a stored client secret hash (PHC string)
#[derive(Debug, Clone)]
pub struct ClientSecretHash(String);

impl ClientSecretHash {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Hash a client secret using Argon2id with a random salt.
pub fn hash_client_secret(secret: &ClientSecret) -> Result<ClientSecretHash, anyhow::Error> {
    if secret.is_empty() {
        return Err(anyhow::anyhow!("Client secret cannot be empty"));
    }

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(secret.as_str().as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash client secret: {}", e))?
        .to_string();

    Ok(ClientSecretHash::new(hash))
}

/// Verify a client secret against its stored hash.
///
/// Returns `Ok(false)` on mismatch and `Err` only when the stored hash is
/// unreadable. The comparison inside argon2 is constant-time.
pub fn verify_client_secret(
    secret: &ClientSecret,
    hash: &ClientSecretHash,
) -> Result<bool, anyhow::Error> {
    let parsed = PasswordHash::new(hash.as_str())
        .map_err(|e| anyhow::anyhow!("Invalid client secret hash format: {}", e))?;

    match Argon2::default().verify_password(secret.as_str().as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("Client secret verification failed: {}", e)),
    }
}
