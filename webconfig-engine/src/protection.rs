use crate::error::{ProtectionError, ProtectionResult};
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use zeroize::ZeroizeOnDrop;

/// Name recorded in `configProtectionProvider` for [`AesGcmProtectionProvider`].
pub const AES_GCM_PROVIDER_NAME: &str = "AesGcmProtectedConfigurationProvider";

/// Encrypts and decrypts the serialized body of a protected configuration section.
pub trait ProtectionProvider: Send + Sync {
    /// Name written to the section's `configProtectionProvider` attribute.
    fn name(&self) -> &str;

    fn encrypt(&self, plaintext: &str) -> ProtectionResult<String>;

    fn decrypt(&self, payload: &str) -> ProtectionResult<String>;
}

/// AES-256-GCM section protection
///
/// Payload format: `v{version}:{nonce_b64}:{ciphertext_b64}` with a fresh
/// 96-bit nonce per encryption. The key is zeroized on drop.
#[derive(ZeroizeOnDrop)]
pub struct AesGcmProtectionProvider {
    #[zeroize(skip)]
    cipher: Aes256Gcm,
    key: [u8; 32],
    #[zeroize(skip)]
    name: String,
    key_version: u32,
}

impl AesGcmProtectionProvider {
    pub fn new(key: [u8; 32]) -> ProtectionResult<Self> {
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| ProtectionError::InvalidKey(e.to_string()))?;

        Ok(Self {
            cipher,
            key,
            name: AES_GCM_PROVIDER_NAME.to_string(),
            key_version: 1,
        })
    }

    /// Create from a base64-encoded 32-byte key
    pub fn from_base64(key_b64: &str) -> ProtectionResult<Self> {
        let key_bytes = BASE64
            .decode(key_b64.trim())
            .map_err(|e| ProtectionError::InvalidKey(e.to_string()))?;

        let key: [u8; 32] = key_bytes
            .as_slice()
            .try_into()
            .map_err(|_| ProtectionError::InvalidKeyLength {
                expected: 32,
                got: key_bytes.len(),
            })?;

        Self::new(key)
    }

    /// Register under a different provider name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.key_version = version;
        self
    }

    pub fn version(&self) -> u32 {
        self.key_version
    }

    /// Generate a new random key (cryptographically secure)
    pub fn generate_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        key
    }

    pub fn generate_key_base64() -> String {
        BASE64.encode(Self::generate_key())
    }
}

impl ProtectionProvider for AesGcmProtectionProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn encrypt(&self, plaintext: &str) -> ProtectionResult<String> {
        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| ProtectionError::EncryptionFailed)?;

        Ok(format!(
            "v{}:{}:{}",
            self.key_version,
            BASE64.encode(nonce_bytes),
            BASE64.encode(ciphertext)
        ))
    }

    fn decrypt(&self, payload: &str) -> ProtectionResult<String> {
        let mut parts = payload.trim().splitn(3, ':');
        let (Some(version), Some(nonce_b64), Some(ciphertext_b64)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(ProtectionError::InvalidFormat);
        };

        let version = version
            .strip_prefix('v')
            .and_then(|v| v.parse::<u32>().ok())
            .ok_or(ProtectionError::InvalidFormat)?;
        if version != self.key_version {
            return Err(ProtectionError::UnsupportedKeyVersion {
                version,
                supported: self.key_version,
            });
        }

        let nonce_bytes = BASE64
            .decode(nonce_b64)
            .map_err(|_| ProtectionError::InvalidFormat)?;
        if nonce_bytes.len() != 12 {
            return Err(ProtectionError::InvalidFormat);
        }
        let ciphertext = BASE64
            .decode(ciphertext_b64)
            .map_err(|_| ProtectionError::InvalidFormat)?;

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .map_err(|_| ProtectionError::DecryptionFailed)?;
        String::from_utf8(plaintext).map_err(|_| ProtectionError::DecryptionFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> AesGcmProtectionProvider {
        AesGcmProtectionProvider::new(AesGcmProtectionProvider::generate_key()).unwrap()
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let provider = provider();
        let xml = "<connectionStrings><add name=\"Main\" connectionString=\"Password=x\" /></connectionStrings>";
        let payload = provider.encrypt(xml).unwrap();
        assert!(payload.starts_with("v1:"));
        assert!(!payload.contains("Password"));
        assert_eq!(provider.decrypt(&payload).unwrap(), xml);
    }

    #[test]
    fn test_different_nonces() {
        let provider = provider();
        let first = provider.encrypt("same").unwrap();
        let second = provider.encrypt("same").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_tampered_payload() {
        let provider = provider();
        let mut payload = provider.encrypt("authenticated").unwrap();
        payload.push('A');
        assert!(provider.decrypt(&payload).is_err());
        assert!(matches!(provider.decrypt("garbage"), Err(ProtectionError::InvalidFormat)));
    }

    #[test]
    fn test_wrong_key_fails() {
        let payload = provider().encrypt("secret").unwrap();
        assert!(matches!(provider().decrypt(&payload), Err(ProtectionError::DecryptionFailed)));
    }

    #[test]
    fn test_wrong_version() {
        let key = AesGcmProtectionProvider::generate_key();
        let v1 = AesGcmProtectionProvider::new(key).unwrap();
        let v2 = AesGcmProtectionProvider::new(key).unwrap().with_version(2);
        let payload = v1.encrypt("versioned").unwrap();
        assert!(matches!(
            v2.decrypt(&payload),
            Err(ProtectionError::UnsupportedKeyVersion { version: 1, supported: 2 })
        ));
    }

    #[test]
    fn test_from_base64() {
        let key = AesGcmProtectionProvider::generate_key_base64();
        let provider = AesGcmProtectionProvider::from_base64(&key).unwrap();
        assert_eq!(provider.name(), AES_GCM_PROVIDER_NAME);
        assert!(matches!(
            AesGcmProtectionProvider::from_base64(&BASE64.encode(b"too_short")),
            Err(ProtectionError::InvalidKeyLength { expected: 32, got: 9 })
        ));
        assert!(AesGcmProtectionProvider::from_base64("not base64!").is_err());
    }
}
