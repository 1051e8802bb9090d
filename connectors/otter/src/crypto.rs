use base64::Engine;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};
use shared::models::SealedPassword;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SealError {
    #[error("Invalid encryption key: {0}")]
    InvalidKey(String),
    #[error("Sealed password is not valid base64 or is too short")]
    Malformed,
    #[error("Sealed password could not be opened with the configured key")]
    Crypto,
}

/// Seals Otter passwords so that clients only ever store ciphertext.
///
/// Output layout is `base64(nonce || ciphertext || tag)` under AES-256-GCM.
pub struct PasswordSealer {
    key: LessSafeKey,
    key_id: String,
    rng: SystemRandom,
}

impl PasswordSealer {
    pub fn from_base64_key(encoded: &str) -> Result<Self, SealError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| SealError::InvalidKey(e.to_string()))?;
        if bytes.len() != AES_256_GCM.key_len() {
            return Err(SealError::InvalidKey(format!(
                "expected {} bytes, got {}",
                AES_256_GCM.key_len(),
                bytes.len()
            )));
        }

        let unbound = UnboundKey::new(&AES_256_GCM, &bytes)
            .map_err(|_| SealError::InvalidKey("rejected by AES-256-GCM".to_string()))?;

        let digest = Sha256::digest(&bytes);
        let key_id = digest[..8].iter().map(|b| format!("{:02x}", b)).collect();

        Ok(Self {
            key: LessSafeKey::new(unbound),
            key_id,
            rng: SystemRandom::new(),
        })
    }

    /// Short fingerprint of the key, returned to clients alongside the sealed output.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn seal(&self, password: &str) -> Result<SealedPassword, SealError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng.fill(&mut nonce_bytes).map_err(|_| SealError::Crypto)?;

        let mut in_out = password.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::empty(),
                &mut in_out,
            )
            .map_err(|_| SealError::Crypto)?;

        let mut sealed = nonce_bytes.to_vec();
        sealed.extend_from_slice(&in_out);

        Ok(SealedPassword {
            output: base64::engine::general_purpose::STANDARD.encode(sealed),
            token: self.key_id.clone(),
        })
    }

    pub fn open(&self, sealed: &str) -> Result<String, SealError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(sealed.trim())
            .map_err(|_| SealError::Malformed)?;
        if bytes.len() <= NONCE_LEN {
            return Err(SealError::Malformed);
        }

        let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes).map_err(|_| SealError::Malformed)?;

        let mut in_out = ciphertext.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| SealError::Crypto)?;

        String::from_utf8(plaintext.to_vec()).map_err(|_| SealError::Crypto)
    }
}
