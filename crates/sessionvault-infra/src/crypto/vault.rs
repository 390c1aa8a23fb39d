//! AES-256-GCM encryption for session payloads at rest.
//!
//! The master key comes from one of three sources (see [`VaultKeySource`]):
//! a hex key file in the data directory (default, created on first use), the
//! OS keychain, or a password stretched with Argon2id.
//!
//! Encrypted format: `nonce (12 bytes) || ciphertext`.
//!
//! SECURITY: error values never contain plaintext or key material.

use std::io::Write;
use std::path::{Path, PathBuf};

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use thiserror::Error;
use tracing::{debug, info};

const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32;

const KEYCHAIN_SERVICE: &str = "sessionvault";
const KEYCHAIN_USER: &str = "session-master-key";

/// Fixed KDF salt: the password supplies the entropy and no verifier is stored.
const PASSWORD_SALT: &[u8] = b"sessionvault-vault-v1";

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("encryption failed")]
    EncryptionFailed,

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("invalid ciphertext: too short")]
    CiphertextTooShort,

    #[error("key derivation failed")]
    KeyDerivationFailed,

    #[error("keychain unavailable: {0}")]
    KeychainUnavailable(String),

    #[error("keychain error: {0}")]
    KeychainError(String),

    #[error("vault key file {path}: {reason}")]
    KeyFile { path: PathBuf, reason: String },
}

/// Where the master key comes from.
#[derive(Debug, Clone)]
pub enum VaultKeySource {
    /// Hex key file, generated with owner-only permissions when missing.
    KeyFile(PathBuf),
    /// OS keychain entry, generated when missing.
    Keychain,
    /// Argon2id-derived from a password.
    Password(String),
}

impl VaultKeySource {
    /// Human-readable label that never includes the password.
    pub fn label(&self) -> String {
        match self {
            VaultKeySource::KeyFile(path) => format!("key file {}", path.display()),
            VaultKeySource::Keychain => "OS keychain".to_string(),
            VaultKeySource::Password(_) => "password (argon2id)".to_string(),
        }
    }
}

/// AES-256-GCM cipher with a random nonce per encryption.
pub struct VaultCrypto {
    cipher: Aes256Gcm,
}

impl VaultCrypto {
    pub fn new(key: &[u8; KEY_SIZE]) -> Self {
        Self {
            cipher: Aes256Gcm::new(key.into()),
        }
    }

    /// Build a cipher from the configured key source.
    pub fn open(source: &VaultKeySource) -> Result<Self, VaultError> {
        debug!(source = %source.label(), "Opening vault key");
        match source {
            VaultKeySource::KeyFile(path) => Self::from_key_file(path),
            VaultKeySource::Keychain => Self::from_keychain(),
            VaultKeySource::Password(password) => Self::from_password(password),
        }
    }

    /// Derive the key with Argon2id (19 MiB, 2 passes, 1 lane).
    pub fn from_password(password: &str) -> Result<Self, VaultError> {
        use argon2::{Algorithm, Argon2, Params, Version};

        let params = Params::new(19456, 2, 1, Some(KEY_SIZE))
            .map_err(|_| VaultError::KeyDerivationFailed)?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut key = [0u8; KEY_SIZE];
        argon2
            .hash_password_into(password.as_bytes(), PASSWORD_SALT, &mut key)
            .map_err(|_| VaultError::KeyDerivationFailed)?;
        Ok(Self::new(&key))
    }

    /// Load the key from the OS keychain, generating and storing one on first
    /// use.
    pub fn from_keychain() -> Result<Self, VaultError> {
        let entry = keyring::Entry::new(KEYCHAIN_SERVICE, KEYCHAIN_USER)
            .map_err(|e| VaultError::KeychainUnavailable(e.to_string()))?;

        match entry.get_password() {
            Ok(hex_key) => {
                let key = parse_key(&hex_key)
                    .map_err(|reason| VaultError::KeychainError(format!("stored key {reason}")))?;
                Ok(Self::new(&key))
            }
            Err(keyring::Error::NoEntry) => {
                let key = rand_bytes();
                entry
                    .set_password(&hex_encode(&key))
                    .map_err(|e| VaultError::KeychainError(e.to_string()))?;
                info!("Generated new session vault key in OS keychain");
                Ok(Self::new(&key))
            }
            Err(e) => Err(VaultError::KeychainUnavailable(e.to_string())),
        }
    }

    /// Load the key from a hex file, generating it on first use.
    ///
    /// New files are written with mode 0600 on unix.
    pub fn from_key_file(path: &Path) -> Result<Self, VaultError> {
        let key_file_err = |reason: String| VaultError::KeyFile {
            path: path.to_path_buf(),
            reason,
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let key = parse_key(contents.trim()).map_err(key_file_err)?;
                Ok(Self::new(&key))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let key = rand_bytes();
                write_key_file(path, &hex_encode(&key)).map_err(|e| key_file_err(e.to_string()))?;
                info!(path = %path.display(), "Generated new session vault key file");
                Ok(Self::new(&key))
            }
            Err(e) => Err(key_file_err(e.to_string())),
        }
    }

    /// Returns `nonce || ciphertext`; output differs on every call.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, VaultError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| VaultError::EncryptionFailed)?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, VaultError> {
        if data.len() < NONCE_SIZE {
            return Err(VaultError::CiphertextTooShort);
        }
        let (nonce, ciphertext) = data.split_at(NONCE_SIZE);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| VaultError::DecryptionFailed)
    }
}

fn write_key_file(path: &Path, hex_key: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(hex_key.as_bytes())?;
    file.sync_all()
}

fn parse_key(hex_key: &str) -> Result<[u8; KEY_SIZE], String> {
    let bytes = hex_decode(hex_key).map_err(|_| "is not valid hex".to_string())?;
    bytes
        .try_into()
        .map_err(|_| format!("must be {KEY_SIZE} bytes"))
}

fn rand_bytes() -> [u8; KEY_SIZE] {
    use aes_gcm::aead::rand_core::RngCore;
    let mut key = [0u8; KEY_SIZE];
    OsRng.fill_bytes(&mut key);
    key
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode(s: &str) -> Result<Vec<u8>, String> {
    if s.len() % 2 != 0 {
        return Err("odd length hex string".to_string());
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            s.get(i..i + 2)
                .ok_or_else(|| format!("invalid hex at position {i}"))
                .and_then(|pair| {
                    u8::from_str_radix(pair, 16).map_err(|e| format!("invalid hex at position {i}: {e}"))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> [u8; KEY_SIZE] {
        let mut key = [0u8; KEY_SIZE];
        for (i, byte) in key.iter_mut().enumerate() {
            *byte = i as u8;
        }
        key
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let crypto = VaultCrypto::new(&test_key());
        let payload = br#"{"sessionId":"0192","servers":[]}"#;
        let encrypted = crypto.encrypt(payload).unwrap();
        assert_ne!(&encrypted[NONCE_SIZE..], payload.as_slice());
        assert_eq!(crypto.decrypt(&encrypted).unwrap(), payload);
    }

    #[test]
    fn test_wrong_key_fails() {
        let mut other = test_key();
        other[0] ^= 0xFF;
        let encrypted = VaultCrypto::new(&test_key()).encrypt(b"payload").unwrap();
        assert!(matches!(
            VaultCrypto::new(&other).decrypt(&encrypted),
            Err(VaultError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_nonce_is_fresh_per_call() {
        let crypto = VaultCrypto::new(&test_key());
        assert_ne!(crypto.encrypt(b"same").unwrap(), crypto.encrypt(b"same").unwrap());
    }

    #[test]
    fn test_short_ciphertext_rejected() {
        let crypto = VaultCrypto::new(&test_key());
        assert!(matches!(
            crypto.decrypt(&[0u8; 4]),
            Err(VaultError::CiphertextTooShort)
        ));
    }

    #[test]
    fn test_password_derivation_is_deterministic() {
        let a = VaultCrypto::from_password("correct horse").unwrap();
        let b = VaultCrypto::from_password("correct horse").unwrap();
        let encrypted = a.encrypt(b"data").unwrap();
        assert_eq!(b.decrypt(&encrypted).unwrap(), b"data");

        let c = VaultCrypto::from_password("battery staple").unwrap();
        assert!(c.decrypt(&encrypted).is_err());
    }

    #[test]
    fn test_key_file_is_created_then_reused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("vault.key");

        let first = VaultCrypto::from_key_file(&path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.len(), KEY_SIZE * 2);

        let second = VaultCrypto::from_key_file(&path).unwrap();
        let encrypted = first.encrypt(b"session").unwrap();
        assert_eq!(second.decrypt(&encrypted).unwrap(), b"session");
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.key");
        VaultCrypto::from_key_file(&path).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_corrupt_key_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.key");
        std::fs::write(&path, "zz-not-hex").unwrap();
        let err = VaultCrypto::from_key_file(&path).err().unwrap();
        assert!(matches!(err, VaultError::KeyFile { .. }));
        assert!(!err.to_string().contains("zz-not-hex"));
    }

    #[test]
    fn test_errors_never_contain_secrets() {
        let errors = [
            VaultError::EncryptionFailed,
            VaultError::DecryptionFailed,
            VaultError::CiphertextTooShort,
            VaultError::KeyDerivationFailed,
            VaultError::KeychainError("stored key must be 32 bytes".to_string()),
        ];
        for err in &errors {
            assert!(!err.to_string().contains("deadbeef"));
        }
        assert_eq!(
            VaultKeySource::Password("hunter2".to_string()).label(),
            "password (argon2id)"
        );
    }

    #[test]
    fn test_hex_roundtrip() {
        let bytes = [0xDE, 0xAD, 0xBE, 0xEF, 0x00];
        assert_eq!(hex_decode(&hex_encode(&bytes)).unwrap(), bytes);
        assert!(hex_decode("abc").is_err());
    }
}
