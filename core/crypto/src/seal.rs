//! Sealed opaque tokens using XChaCha20-Poly1305.
//!
//! A sealed token is `base64url(nonce || ciphertext)` under a key derived
//! from the master secret and a namespace string. The token *is* the state:
//! the server keeps no matching record, so anything a client must echo back
//! (pagination cursor, session identity) travels through here.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use chacha20poly1305::{
    aead::{generic_array::GenericArray, Aead, AeadCore, KeyInit, OsRng},
    XChaCha20Poly1305,
};
use serde::{de::DeserializeOwned, Serialize};
use zeroize::Zeroizing;

use drivegate_common::{Error, Result};

/// Nonce size for XChaCha20-Poly1305 (24 bytes).
pub const NONCE_SIZE: usize = 24;

/// Authentication tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

/// Seals and opens opaque tokens keyed by `(master_secret, namespace)`.
///
/// Each namespace gets its own derived key, so leaking one namespace's key
/// cannot forge another's tokens, and a token sealed for one purpose is
/// rejected when presented for another.
#[derive(Clone)]
pub struct TokenSealer {
    secret: String,
}

impl TokenSealer {
    /// Create a sealer from the application master secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Derive the symmetric key for a namespace.
    ///
    /// Key = Blake2b-256(secret || ":" || namespace). Deterministic, so two
    /// process instances sharing a secret interoperate without coordination.
    fn derive_key(&self, namespace: &str) -> Zeroizing<[u8; 32]> {
        let mut hasher = Blake2b::<U32>::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(b":");
        hasher.update(namespace.as_bytes());

        let result = hasher.finalize();
        let mut key = Zeroizing::new([0u8; 32]);
        key.copy_from_slice(&result);
        key
    }

    /// Seal a plaintext into a URL-safe opaque token.
    ///
    /// # Postconditions
    /// - Returns base64url (no padding) of `nonce || ciphertext || tag`
    /// - A fresh random nonce is generated per call, so sealing the same
    ///   plaintext twice yields different tokens
    ///
    /// # Errors
    /// - Returns `Error::Crypto` if encryption fails
    pub fn seal(&self, namespace: &str, plaintext: &[u8]) -> Result<String> {
        let key = self.derive_key(namespace);
        let cipher = XChaCha20Poly1305::new(GenericArray::from_slice(key.as_ref()));
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);

        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| Error::Crypto(format!("Encryption failed: {}", e)))?;

        let mut packed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        packed.extend_from_slice(&nonce);
        packed.extend_from_slice(&ciphertext);

        Ok(URL_SAFE_NO_PAD.encode(packed))
    }

    /// Open a token, returning the original plaintext.
    ///
    /// Fails closed: bad encoding, truncated input, or an authentication
    /// tag mismatch all map to `Error::Auth` with no partial output.
    pub fn open(&self, namespace: &str, token: &str) -> Result<Vec<u8>> {
        let data = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| Error::Auth("malformed token encoding".to_string()))?;
        self.open_raw(namespace, &data)
    }

    /// Open an unencoded `nonce || ciphertext` blob (remote credential and
    /// user-directory blobs are stored in this raw form).
    pub fn open_raw(&self, namespace: &str, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < NONCE_SIZE + TAG_SIZE {
            return Err(Error::Auth("token too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = data.split_at(NONCE_SIZE);
        let key = self.derive_key(namespace);
        let cipher = XChaCha20Poly1305::new(GenericArray::from_slice(key.as_ref()));

        cipher
            .decrypt(GenericArray::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| Error::Auth("token authentication failed".to_string()))
    }

    /// Seal a serde value as JSON plaintext.
    pub fn seal_json<T: Serialize>(&self, namespace: &str, value: &T) -> Result<String> {
        let plaintext =
            serde_json::to_vec(value).map_err(|e| Error::Serialization(e.to_string()))?;
        self.seal(namespace, &plaintext)
    }

    /// Open a token and deserialize its JSON plaintext.
    ///
    /// A plaintext that authenticates but is not valid JSON for `T` is
    /// still rejected as `Error::Auth`: it cannot have been produced by
    /// this process family.
    pub fn open_json<T: DeserializeOwned>(&self, namespace: &str, token: &str) -> Result<T> {
        let plaintext = self.open(namespace, token)?;
        serde_json::from_slice(&plaintext)
            .map_err(|_| Error::Auth("token payload malformed".to_string()))
    }

    /// Seal raw bytes without encoding, for provisioning remote blobs.
    pub fn seal_raw(&self, namespace: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
        let key = self.derive_key(namespace);
        let cipher = XChaCha20Poly1305::new(GenericArray::from_slice(key.as_ref()));
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);

        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| Error::Crypto(format!("Encryption failed: {}", e)))?;

        let mut packed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        packed.extend_from_slice(&nonce);
        packed.extend_from_slice(&ciphertext);
        Ok(packed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sealer() -> TokenSealer {
        TokenSealer::new("test-master-secret")
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let s = sealer();
        let plaintext = b"{\"page\":\"cursor-123\"}";

        let token = s.seal("pageToken", plaintext).unwrap();
        let opened = s.open("pageToken", &token).unwrap();

        assert_eq!(opened, plaintext);
    }

    #[test]
    fn test_token_is_url_safe() {
        let s = sealer();
        let token = s.seal("pageToken", &[0xffu8; 64]).unwrap();

        assert!(!token.contains('+'));
        assert!(!token.contains('/'));
        assert!(!token.contains('='));
    }

    #[test]
    fn test_fresh_nonce_each_seal() {
        let s = sealer();

        let t1 = s.seal("pageToken", b"same").unwrap();
        let t2 = s.seal("pageToken", b"same").unwrap();

        assert_ne!(t1, t2);
    }

    #[test]
    fn test_any_single_bit_flip_rejected() {
        let s = sealer();
        let token = s.seal("userToken", b"identity").unwrap();
        let raw = URL_SAFE_NO_PAD.decode(&token).unwrap();

        for byte in 0..raw.len() {
            for bit in 0..8 {
                let mut tampered = raw.clone();
                tampered[byte] ^= 1 << bit;
                let tampered_token = URL_SAFE_NO_PAD.encode(&tampered);
                assert!(
                    s.open("userToken", &tampered_token).is_err(),
                    "bit {} of byte {} accepted",
                    bit,
                    byte
                );
            }
        }
    }

    #[test]
    fn test_cross_namespace_rejected() {
        let s = sealer();
        let token = s.seal("pageToken", b"cursor").unwrap();

        assert!(s.open("userToken", &token).is_err());
        assert!(s.open("account", &token).is_err());
    }

    #[test]
    fn test_different_secret_rejected() {
        let token = sealer().seal("pageToken", b"cursor").unwrap();
        let other = TokenSealer::new("other-secret");

        assert!(other.open("pageToken", &token).is_err());
    }

    #[test]
    fn test_truncated_rejected() {
        let s = sealer();
        let token = s.seal("pageToken", b"cursor").unwrap();
        let raw = URL_SAFE_NO_PAD.decode(&token).unwrap();

        let truncated = URL_SAFE_NO_PAD.encode(&raw[..NONCE_SIZE + TAG_SIZE - 1]);
        assert!(s.open("pageToken", &truncated).is_err());
        assert!(s.open("pageToken", "").is_err());
    }

    #[test]
    fn test_garbage_encoding_rejected() {
        let s = sealer();
        assert!(s.open("pageToken", "not base64!!!").is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Claims {
            name: String,
            pass: String,
        }

        let s = sealer();
        let claims = Claims {
            name: "alice".to_string(),
            pass: "pw".to_string(),
        };

        let token = s.seal_json("userToken", &claims).unwrap();
        let opened: Claims = s.open_json("userToken", &token).unwrap();
        assert_eq!(opened, claims);
    }

    #[test]
    fn test_json_wrong_shape_rejected() {
        #[derive(serde::Deserialize, Debug)]
        struct Claims {
            #[allow(dead_code)]
            name: String,
        }

        let s = sealer();
        let token = s.seal("userToken", b"[1,2,3]").unwrap();
        assert!(s.open_json::<Claims>("userToken", &token).is_err());
    }

    #[test]
    fn test_raw_blob_roundtrip() {
        let s = sealer();
        let blob = s.seal_raw("account", b"{\"type\":\"service_account\"}").unwrap();
        let opened = s.open_raw("account", &blob).unwrap();
        assert_eq!(opened, b"{\"type\":\"service_account\"}");
    }
}
