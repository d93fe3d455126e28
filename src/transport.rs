use crate::{CryptographyConfiguration, Error, Result, SessionId, SessionIdFactory};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::trace;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// A session id as it travels through the client: encrypted, and authenticated by a MAC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentificationData {
    session_id: String,
    hmac: Vec<u8>,
}

impl SessionIdentificationData {
    /// Combine an encrypted session id with its MAC.
    pub fn new(session_id: String, hmac: Vec<u8>) -> Self {
        Self { session_id, hmac }
    }

    /// The encrypted session id.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The MAC of the encrypted session id.
    pub fn hmac(&self) -> &[u8] {
        &self.hmac
    }
}

/// The transport encoding: the base64 encoded MAC, directly followed by the encrypted session id.
impl Display for SessionIdentificationData {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", STANDARD.encode(&self.hmac), self.session_id)
    }
}

/// Length of the padded base64 encoding of `byte_length` bytes.
fn base64_length(byte_length: usize) -> usize {
    (byte_length + 2) / 3 * 4
}

/// Compares the first `length` bytes of both MACs in constant time.
/// Fails if either MAC is shorter than `length`.
fn hmac_matches(expected: &[u8], provided: &[u8], length: usize) -> bool {
    if length == 0 || expected.len() < length || provided.len() < length {
        return false;
    }
    expected[..length].ct_eq(&provided[..length]).into()
}

/// Protects session ids that are handed to the client, and recovers them from client input.
///
/// Everything read from the client is untrusted. Decoding never fails loudly: any malformed,
/// tampered or foreign input simply yields a freshly minted session id.
#[derive(Debug, Clone)]
pub struct TransportCodec {
    crypto: CryptographyConfiguration,
    id_factory: Arc<dyn SessionIdFactory>,
}

impl TransportCodec {
    /// Create a codec that uses the keys of `crypto` and mints ids with `id_factory`.
    pub fn new(crypto: CryptographyConfiguration, id_factory: Arc<dyn SessionIdFactory>) -> Self {
        Self { crypto, id_factory }
    }

    /// The factory used to mint and parse session ids.
    pub fn id_factory(&self) -> &Arc<dyn SessionIdFactory> {
        &self.id_factory
    }

    /// Split a transport value into MAC and encrypted session id.
    ///
    /// Returns `None` if the value is shorter than the encoded MAC, or if the MAC is not valid base64.
    /// The MAC is not checked.
    pub fn decode(&self, transport_value: &str) -> Option<SessionIdentificationData> {
        let hmac_length = base64_length(self.crypto.hmac().hmac_length());
        if transport_value.len() < hmac_length || !transport_value.is_char_boundary(hmac_length) {
            return None;
        }

        let (encoded_hmac, session_id) = transport_value.split_at(hmac_length);
        let hmac = STANDARD.decode(encoded_hmac).ok()?;
        Some(SessionIdentificationData::new(session_id.to_owned(), hmac))
    }

    /// Encode `data` for transport.
    pub fn encode(&self, data: &SessionIdentificationData) -> String {
        data.to_string()
    }

    /// Returns true if the MAC of `data` was produced with our key over its encrypted session id.
    pub fn is_valid_hmac(&self, data: &SessionIdentificationData) -> bool {
        if data.hmac.is_empty() {
            return false;
        }
        let hmac = self.crypto.hmac();
        let expected = hmac.generate_hmac(&data.session_id);
        hmac_matches(&expected, &data.hmac, hmac.hmac_length())
    }

    /// Recover the session id carried by `transport_value`.
    ///
    /// Any failure along the way (no value, bad encoding, bad MAC, failed decryption, malformed id)
    /// results in a new session id.
    pub fn open(&self, transport_value: Option<&str>) -> SessionId {
        transport_value
            .and_then(|value| self.decode(value))
            .filter(|data| self.is_valid_hmac(data))
            .and_then(|data| self.crypto.encryption().decrypt(&data.session_id))
            .filter(|plain| !plain.is_empty())
            .and_then(|plain| self.id_factory.create_from(Some(&plain)))
            .unwrap_or_else(|| {
                trace!("No usable session id in request, minting a new one");
                self.id_factory.create_new()
            })
    }

    /// Encrypt and authenticate `id` for transport.
    pub fn seal(&self, id: &SessionId) -> Result<SessionIdentificationData> {
        if id.is_empty() {
            return Err(Error::EmptySessionId);
        }
        let session_id = self.crypto.encryption().encrypt(&id.value().to_string())?;
        let hmac = self.crypto.hmac().generate_hmac(&session_id);
        Ok(SessionIdentificationData::new(session_id, hmac))
    }
}
