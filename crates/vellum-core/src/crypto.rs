//! Encryption context: AES-256-GCM sealing for everything written to the store.
//!
//! ## Wire Format
//!
//! Each sealed payload is stored as: `[4-byte version (BE)][12-byte nonce][ciphertext+tag]`.
//! The version prefix is bound to the ciphertext as associated data, so flipping it
//! fails authentication just like flipping a ciphertext byte. The nonce is randomly
//! generated per seal via `OsRng`.
//!
//! ## Key File
//!
//! The 32-byte key and its creation time live in a JSON key file
//! (`dbencryptionkey.json`). The file is generated once, at store creation, and
//! loaded at every start. There is no rotation: replacing the file makes existing
//! data unreadable.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    Aes256Gcm, Key, Nonce,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{StoreError, StoreResult};

/// AES-256-GCM nonce length (96 bits).
const NONCE_LEN: usize = 12;

/// Length of the big-endian version prefix.
const VERSION_LEN: usize = 4;

/// Name of the key file inside the data directory.
pub const DEFAULT_ENCRYPTION_KEY_FILENAME: &str = "dbencryptionkey.json";

/// Errors specific to sealing and opening payloads.
#[derive(Debug, Clone)]
pub enum CryptoError {
    /// Encryption failed (should never happen with a valid key).
    SealFailed(String),
    /// Authentication failed: wrong key, tampered envelope or corrupted blob.
    OpenFailed,
    /// The blob is too short to contain a version prefix, nonce and tag.
    CorruptBlob,
}

impl std::fmt::Display for CryptoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SealFailed(e) => write!(f, "seal failed: {}", e),
            Self::OpenFailed => write!(f, "could not open sealed payload (wrong key or corrupted data)"),
            Self::CorruptBlob => write!(f, "corrupt sealed payload (too short)"),
        }
    }
}

impl std::error::Error for CryptoError {}

/// Symmetric key plus the unix time (seconds) it was created.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncryptionKey {
    pub key: [u8; 32],
    pub time: i64,
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("key", &"<redacted>")
            .field("time", &self.time)
            .finish()
    }
}

impl EncryptionKey {
    /// Generates a fresh random key stamped with the current time.
    pub fn generate() -> Self {
        let generated = Aes256Gcm::generate_key(OsRng);
        let mut key = [0u8; 32];
        key.copy_from_slice(generated.as_slice());
        Self {
            key,
            time: chrono::Utc::now().timestamp(),
        }
    }

    pub fn from_bytes(key: [u8; 32]) -> Self {
        Self {
            key,
            time: chrono::Utc::now().timestamp(),
        }
    }
}

/// Holds the cipher for one key. Cheap to share behind a reference.
pub struct EncryptionContext {
    cipher: Aes256Gcm,
    created: i64,
}

impl EncryptionContext {
    pub fn new(key: &EncryptionKey) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key.key)),
            created: key.time,
        }
    }

    /// Unix time the underlying key was created.
    #[inline]
    pub fn key_created(&self) -> i64 {
        self.created
    }

    /// Seals `plaintext` into `[version || nonce || ciphertext]`.
    pub fn seal(&self, version: u32, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let prefix = version.to_be_bytes();
        let nonce = Aes256Gcm::generate_nonce(OsRng);
        let ciphertext = self
            .cipher
            .encrypt(
                &nonce,
                Payload {
                    msg: plaintext,
                    aad: &prefix,
                },
            )
            .map_err(|e| CryptoError::SealFailed(e.to_string()))?;
        let mut out = Vec::with_capacity(VERSION_LEN + NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&prefix);
        out.extend_from_slice(nonce.as_slice());
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Opens a payload produced by [`seal`](Self::seal), returning the plaintext and
    /// the embedded version. Fails closed: nothing is returned unless the tag verifies.
    pub fn open(&self, sealed: &[u8]) -> Result<(Vec<u8>, u32), CryptoError> {
        // 16-byte GCM tag is always present, even for empty plaintext.
        if sealed.len() < VERSION_LEN + NONCE_LEN + 16 {
            return Err(CryptoError::CorruptBlob);
        }
        let (prefix, rest) = sealed.split_at(VERSION_LEN);
        let (nonce_bytes, ct) = rest.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(
                Nonce::from_slice(nonce_bytes),
                Payload { msg: ct, aad: prefix },
            )
            .map_err(|_| CryptoError::OpenFailed)?;
        let mut version = [0u8; VERSION_LEN];
        version.copy_from_slice(prefix);
        Ok((plaintext, u32::from_be_bytes(version)))
    }
}

/// Seals `data` with `version` under `key`.
pub fn seal(version: u32, key: &EncryptionKey, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    EncryptionContext::new(key).seal(version, data)
}

/// Opens `data` under `key`, returning `(plaintext, embedded_version)`.
pub fn open(key: &EncryptionKey, data: &[u8]) -> Result<(Vec<u8>, u32), CryptoError> {
    EncryptionContext::new(key).open(data)
}

/// Writes the key file as JSON. On unix the file is created owner-read/write only.
pub fn save_encryption_key(key: &EncryptionKey, path: &Path) -> StoreResult<()> {
    let encoded = serde_json::to_vec(key)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)?;
        file.write_all(&encoded)?;
    }
    #[cfg(not(unix))]
    {
        std::fs::write(path, &encoded)?;
    }
    Ok(())
}

/// Loads the key file. Any failure is reported as `LoadingEncryptionKey`.
pub fn load_encryption_key(path: &Path) -> StoreResult<EncryptionKey> {
    let loading = |reason: String| StoreError::LoadingEncryptionKey {
        path: path.display().to_string(),
        reason,
    };
    let bytes = std::fs::read(path).map_err(|e| loading(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| loading(e.to_string()))
}

/// Loads the key file at `path`, generating it first if it does not exist yet.
/// An existing key file is never overwritten.
pub fn resolve_encryption_key(path: &Path) -> StoreResult<EncryptionKey> {
    if !path.exists() {
        save_encryption_key(&EncryptionKey::generate(), path)?;
        tracing::info!(
            target: "vellum::crypto",
            path = %path.display(),
            "generated new encryption key"
        );
    }
    load_encryption_key(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> EncryptionKey {
        // Deterministic test key (NOT for production)
        let mut key = [0u8; 32];
        for (i, b) in key.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(7).wrapping_add(42);
        }
        EncryptionKey { key, time: 1_700_000_000 }
    }

    #[test]
    fn seal_open_roundtrip() {
        let key = test_key();
        let plaintext = b"account payload";
        let sealed = seal(1, &key, plaintext).unwrap();

        let sealed_str = String::from_utf8_lossy(&sealed);
        assert!(!sealed_str.contains("account payload"));

        let (opened, version) = open(&key, &sealed).unwrap();
        assert_eq!(opened, plaintext);
        assert_eq!(version, 1);
    }

    #[test]
    fn embedded_version_is_returned() {
        let key = test_key();
        let sealed = seal(7, &key, b"x").unwrap();
        let (_, version) = open(&key, &sealed).unwrap();
        assert_eq!(version, 7);
    }

    #[test]
    fn empty_plaintext_roundtrip() {
        let key = test_key();
        let sealed = seal(1, &key, b"").unwrap();
        let (opened, _) = open(&key, &sealed).unwrap();
        assert!(opened.is_empty());
    }

    #[test]
    fn wrong_key_fails() {
        let key1 = test_key();
        let mut key2 = test_key();
        key2.key[0] ^= 0xFF;

        let sealed = seal(1, &key1, b"secret").unwrap();
        assert!(matches!(open(&key2, &sealed), Err(CryptoError::OpenFailed)));
    }

    #[test]
    fn tampered_version_prefix_fails() {
        let key = test_key();
        let mut sealed = seal(1, &key, b"secret").unwrap();
        sealed[3] = 2;
        assert!(matches!(open(&key, &sealed), Err(CryptoError::OpenFailed)));
    }

    #[test]
    fn corrupt_blob_detected() {
        let key = test_key();
        assert!(matches!(open(&key, &[1, 2, 3]), Err(CryptoError::CorruptBlob)));
    }

    #[test]
    fn key_debug_is_redacted() {
        let rendered = format!("{:?}", test_key());
        assert!(rendered.contains("redacted"));
        assert!(!rendered.contains("42"));
    }

    #[test]
    fn resolve_generates_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_ENCRYPTION_KEY_FILENAME);
        let first = resolve_encryption_key(&path).unwrap();
        assert_eq!(load_encryption_key(&path).unwrap(), first);

        let again = resolve_encryption_key(&path).unwrap();
        assert_eq!(again, first);
    }

    #[test]
    fn missing_key_file_is_loading_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_encryption_key(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, StoreError::LoadingEncryptionKey { .. }));
    }
}
