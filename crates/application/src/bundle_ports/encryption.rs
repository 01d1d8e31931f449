use appbundle_core::AppResult;

/// Port for encrypting datasource secrets at rest.
///
/// Stored values are opaque text produced by [`SecretEncryptor::encrypt_secret`].
pub trait SecretEncryptor: Send + Sync {
    /// Encrypts one cleartext secret for storage.
    fn encrypt_secret(&self, plaintext: &str) -> AppResult<String>;

    /// Decrypts one stored secret.
    fn decrypt_secret(&self, stored: &str) -> AppResult<String>;
}
