//! Keyed primitives used to protect session ids on their way through the client.

use crate::{Error, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::Rng;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

const NONCE_LEN: usize = 12;

/// Symmetric encryption of text.
pub trait EncryptionProvider: Debug + Send + Sync {
    /// Encrypt `plain` into a string that is safe to put into a cookie.
    fn encrypt(&self, plain: &str) -> Result<String>;

    /// Decrypt the output of [`EncryptionProvider::encrypt`].
    ///
    /// Returns `None` for any input that was not produced by this provider with the same key.
    fn decrypt(&self, cipher: &str) -> Option<String>;
}

/// A keyed message authentication code over text.
pub trait HmacProvider: Debug + Send + Sync {
    /// Compute the MAC of `data`. The result is always [`HmacProvider::hmac_length`] bytes long.
    fn generate_hmac(&self, data: &str) -> Vec<u8>;

    /// The length of a MAC in bytes.
    fn hmac_length(&self) -> usize;
}

/// ChaCha20-Poly1305 encryption with a random nonce per message.
///
/// The output is the URL-safe, unpadded base64 encoding of the nonce followed by the ciphertext.
// Key material is not duplicated implicitly.
#[allow(missing_copy_implementations)]
pub struct ChaChaEncryptionProvider {
    cipher: ChaCha20Poly1305,
}

impl ChaChaEncryptionProvider {
    /// Create a provider with the given 256-bit key.
    pub fn new(key: [u8; 32]) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(&key)),
        }
    }
}

impl EncryptionProvider for ChaChaEncryptionProvider {
    fn encrypt(&self, plain: &str) -> Result<String> {
        let nonce: [u8; NONCE_LEN] = rand::thread_rng().gen();
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plain.as_bytes())
            .map_err(|error| Error::Encryption(error.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    fn decrypt(&self, cipher: &str) -> Option<String> {
        let sealed = URL_SAFE_NO_PAD.decode(cipher).ok()?;
        if sealed.len() < NONCE_LEN {
            return None;
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let plain = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .ok()?;
        String::from_utf8(plain).ok()
    }
}

impl Debug for ChaChaEncryptionProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChaChaEncryptionProvider").finish_non_exhaustive()
    }
}

/// Keyed BLAKE3 as a MAC.
// Key material is not duplicated implicitly.
#[allow(missing_copy_implementations)]
pub struct Blake3HmacProvider {
    key: [u8; blake3::KEY_LEN],
}

impl Blake3HmacProvider {
    /// Create a provider with the given 256-bit key.
    pub fn new(key: [u8; blake3::KEY_LEN]) -> Self {
        Self { key }
    }
}

impl HmacProvider for Blake3HmacProvider {
    fn generate_hmac(&self, data: &str) -> Vec<u8> {
        blake3::keyed_hash(&self.key, data.as_bytes())
            .as_bytes()
            .to_vec()
    }

    fn hmac_length(&self) -> usize {
        blake3::OUT_LEN
    }
}

impl Debug for Blake3HmacProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blake3HmacProvider").finish_non_exhaustive()
    }
}

/// The pair of keyed providers that protect session ids.
#[derive(Debug, Clone)]
pub struct CryptographyConfiguration {
    encryption: Arc<dyn EncryptionProvider>,
    hmac: Arc<dyn HmacProvider>,
}

impl CryptographyConfiguration {
    /// Combine the given providers.
    pub fn new(encryption: Arc<dyn EncryptionProvider>, hmac: Arc<dyn HmacProvider>) -> Self {
        Self { encryption, hmac }
    }

    /// Use the default providers with the given keys.
    ///
    /// Use fixed keys whenever session ids must stay valid across restarts of the process
    /// that owns the keys, e.g. when a load balancer may route clients to a restarted instance.
    pub fn from_keys(encryption_key: [u8; 32], hmac_key: [u8; 32]) -> Self {
        Self::new(
            Arc::new(ChaChaEncryptionProvider::new(encryption_key)),
            Arc::new(Blake3HmacProvider::new(hmac_key)),
        )
    }

    /// Use the default providers with keys drawn from [`rand::thread_rng`].
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        Self::from_keys(rng.gen(), rng.gen())
    }

    /// The encryption provider.
    pub fn encryption(&self) -> &Arc<dyn EncryptionProvider> {
        &self.encryption
    }

    /// The MAC provider.
    pub fn hmac(&self) -> &Arc<dyn HmacProvider> {
        &self.hmac
    }
}

impl Default for CryptographyConfiguration {
    fn default() -> Self {
        Self::random()
    }
}
