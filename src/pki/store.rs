use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use rcgen::KeyPair;
use thiserror::Error;

use crate::pki::authority::{self, CredentialPair};
use crate::pki::san::SanSet;

const CERT_EXT: &str = "crt";
const KEY_EXT: &str = "key";
const KEY_FILE_MODE: u32 = 0o600;
const PKI_DIR_MODE: u32 = 0o700;

/// On-disk state of one credential pair, probed before any load or write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreState {
    /// Neither file exists.
    Absent,
    /// Exactly one of the two files exists; `missing` names the other.
    Partial { missing: String },
    /// Both files exist. Says nothing about whether they parse.
    Present,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{} does not contain a valid certificate", path.display())]
    MalformedCertificate { path: PathBuf },
    #[error("{} does not contain a usable private key", path.display())]
    MalformedKey {
        path: PathBuf,
        source: rcgen::Error,
    },
}

/// A credential pair loaded from disk, along with the certificate facts the
/// provisioner validates against.
#[derive(Debug, Clone)]
pub struct LoadedCredential {
    pub pair: CredentialPair,
    pub is_ca: bool,
    pub sans: SanSet,
}

/// Persistent key-pair store: two fixed files per credential base name
/// (`<base>.key`, `<base>.crt`) under one PKI directory.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn cert_path(&self, base: &str) -> PathBuf {
        self.dir.join(format!("{base}.{CERT_EXT}"))
    }

    #[must_use]
    pub fn key_path(&self, base: &str) -> PathBuf {
        self.dir.join(format!("{base}.{KEY_EXT}"))
    }

    /// Classifies the on-disk state of the named credential without reading
    /// file contents.
    #[must_use]
    pub fn probe(&self, base: &str) -> StoreState {
        let cert = self.cert_path(base).exists();
        let key = self.key_path(base).exists();
        match (key, cert) {
            (false, false) => StoreState::Absent,
            (true, true) => StoreState::Present,
            (true, false) => StoreState::Partial {
                missing: format!("{base}.{CERT_EXT}"),
            },
            (false, true) => StoreState::Partial {
                missing: format!("{base}.{KEY_EXT}"),
            },
        }
    }

    /// Loads and parses both halves of the named credential.
    ///
    /// # Errors
    /// Returns error if either file cannot be read, or if the certificate or
    /// key does not parse. Never modifies the store.
    pub fn load(&self, base: &str) -> Result<LoadedCredential, StoreError> {
        let cert_path = self.cert_path(base);
        let cert_pem = fs::read_to_string(&cert_path).map_err(|source| StoreError::Read {
            path: cert_path.clone(),
            source,
        })?;
        let facts = authority::inspect(&cert_pem)
            .map_err(|_| StoreError::MalformedCertificate { path: cert_path })?;

        let key_path = self.key_path(base);
        let key_pem = fs::read_to_string(&key_path).map_err(|source| StoreError::Read {
            path: key_path.clone(),
            source,
        })?;
        KeyPair::from_pem(&key_pem).map_err(|source| StoreError::MalformedKey {
            path: key_path,
            source,
        })?;

        Ok(LoadedCredential {
            pair: CredentialPair { cert_pem, key_pem },
            is_ca: facts.is_ca,
            sans: facts.sans,
        })
    }

    /// Persists a credential pair under the named base.
    ///
    /// The key is written before the certificate, so a crash between the two
    /// writes probes as [`StoreState::Partial`] on the next run rather than
    /// passing for a complete pair.
    ///
    /// # Errors
    /// Returns error if the directory cannot be prepared or either file
    /// cannot be written with its permissions.
    pub fn save(&self, base: &str, pair: &CredentialPair) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Write {
            path: self.dir.clone(),
            source,
        })?;
        fs::set_permissions(&self.dir, fs::Permissions::from_mode(PKI_DIR_MODE)).map_err(
            |source| StoreError::Write {
                path: self.dir.clone(),
                source,
            },
        )?;

        let key_path = self.key_path(base);
        fs::write(&key_path, &pair.key_pem).map_err(|source| StoreError::Write {
            path: key_path.clone(),
            source,
        })?;
        fs::set_permissions(&key_path, fs::Permissions::from_mode(KEY_FILE_MODE)).map_err(
            |source| StoreError::Write {
                path: key_path,
                source,
            },
        )?;

        let cert_path = self.cert_path(base);
        fs::write(&cert_path, &pair.cert_pem).map_err(|source| StoreError::Write {
            path: cert_path,
            source,
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::pki::authority::generate_self_signed_ca;

    #[test]
    fn test_probe_absent() {
        let dir = tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        assert_eq!(store.probe("ca"), StoreState::Absent);
    }

    #[test]
    fn test_probe_partial_names_the_missing_file() {
        let dir = tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        fs::write(store.key_path("ca"), "key-data").unwrap();

        assert_eq!(
            store.probe("ca"),
            StoreState::Partial {
                missing: "ca.crt".to_string()
            }
        );
    }

    #[test]
    fn test_save_then_probe_present_and_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("pki"));
        let pair = generate_self_signed_ca().unwrap();

        store.save("ca", &pair).unwrap();
        assert_eq!(store.probe("ca"), StoreState::Present);

        let loaded = store.load("ca").unwrap();
        assert_eq!(loaded.pair.cert_pem, pair.cert_pem);
        assert_eq!(loaded.pair.key_pem, pair.key_pem);
        assert!(loaded.is_ca);
    }

    #[test]
    fn test_save_applies_secure_permissions() {
        let dir = tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("pki"));
        let pair = generate_self_signed_ca().unwrap();

        store.save("ca", &pair).unwrap();

        let dir_mode = fs::metadata(store.dir()).unwrap().permissions().mode() & 0o777;
        let key_mode = fs::metadata(store.key_path("ca"))
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, PKI_DIR_MODE);
        assert_eq!(key_mode, KEY_FILE_MODE);
    }

    #[test]
    fn test_load_rejects_malformed_certificate() {
        let dir = tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        fs::write(store.cert_path("ca"), "garbage").unwrap();
        fs::write(store.key_path("ca"), "garbage").unwrap();

        let err = store.load("ca").unwrap_err();
        assert!(matches!(err, StoreError::MalformedCertificate { .. }));
    }

    #[test]
    fn test_load_rejects_malformed_key() {
        let dir = tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        let pair = generate_self_signed_ca().unwrap();
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.cert_path("ca"), &pair.cert_pem).unwrap();
        fs::write(store.key_path("ca"), "garbage").unwrap();

        let err = store.load("ca").unwrap_err();
        assert!(matches!(err, StoreError::MalformedKey { .. }));
    }
}
