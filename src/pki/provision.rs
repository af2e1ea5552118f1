use tracing::info;

use crate::pki::authority::{self, CredentialPair};
use crate::pki::coverage;
use crate::pki::error::ProvisionError;
use crate::pki::san::SanSet;
use crate::pki::store::{CredentialStore, StoreState};
use crate::pki::{APISERVER_COMMON_NAME, CredentialRole};
use crate::report::StatusSink;

/// How a credential pair was resolved. Reporting only, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningOutcome {
    Reused,
    Generated,
}

/// Resolves the cluster CA pair: reuses a valid stored pair, generates and
/// persists a fresh self-signed pair into an empty slot, and fails on
/// anything in between.
///
/// # Errors
/// `IncompleteCredential` if exactly one of the two files exists,
/// `CorruptCredential` if a present pair does not load,
/// `NotACertificateAuthority` if the stored certificate lacks the CA bit,
/// `SigningFailed` / `PersistFailed` on generation. Existing files are never
/// modified or deleted on any path.
pub fn ensure_certificate_authority(
    store: &CredentialStore,
    status: &mut dyn StatusSink,
) -> Result<(CredentialPair, ProvisioningOutcome), ProvisionError> {
    let role = CredentialRole::CertificateAuthority;
    match store.probe(role.base_name()) {
        StoreState::Partial { missing } => Err(ProvisionError::IncompleteCredential {
            role,
            dir: store.dir().to_path_buf(),
            missing,
        }),
        StoreState::Present => {
            let loaded =
                store
                    .load(role.base_name())
                    .map_err(|source| ProvisionError::CorruptCredential {
                        role,
                        dir: store.dir().to_path_buf(),
                        source,
                    })?;
            if !loaded.is_ca {
                return Err(ProvisionError::NotACertificateAuthority {
                    path: store.cert_path(role.base_name()),
                });
            }
            info!(dir = %store.dir().display(), "reusing stored cluster CA");
            status.step("using existing CA certificate and key");
            Ok((loaded.pair, ProvisioningOutcome::Reused))
        }
        StoreState::Absent => {
            let pair = authority::generate_self_signed_ca()
                .map_err(|source| ProvisionError::SigningFailed { role, source })?;
            store
                .save(role.base_name(), &pair)
                .map_err(|source| ProvisionError::PersistFailed {
                    role,
                    dir: store.dir().to_path_buf(),
                    source,
                })?;
            info!(dir = %store.dir().display(), "generated cluster CA");
            status.step("generated CA certificate and key");
            Ok((pair, ProvisioningOutcome::Generated))
        }
    }
}

/// Resolves the API server pair against the required SAN set, signing a
/// fresh pair with `ca` when the slot is empty.
///
/// A reused pair must still cover `required`; a gap fails with
/// `StaleServerCertificate` rather than silently shipping a certificate
/// clients will reject.
///
/// # Errors
/// As [`ensure_certificate_authority`], plus `StaleServerCertificate` for a
/// healthy stored pair that no longer covers the requirement.
pub fn ensure_server_certificate(
    store: &CredentialStore,
    ca: &CredentialPair,
    required: &SanSet,
    status: &mut dyn StatusSink,
) -> Result<(CredentialPair, ProvisioningOutcome), ProvisionError> {
    let role = CredentialRole::ServerLeaf;
    match store.probe(role.base_name()) {
        StoreState::Partial { missing } => Err(ProvisionError::IncompleteCredential {
            role,
            dir: store.dir().to_path_buf(),
            missing,
        }),
        StoreState::Present => {
            let loaded =
                store
                    .load(role.base_name())
                    .map_err(|source| ProvisionError::CorruptCredential {
                        role,
                        dir: store.dir().to_path_buf(),
                        source,
                    })?;
            if !coverage::covers(&loaded.sans, required) {
                return Err(ProvisionError::StaleServerCertificate {
                    path: store.cert_path(role.base_name()),
                    missing: coverage::missing(&loaded.sans, required).to_string(),
                });
            }
            info!(dir = %store.dir().display(), "reusing stored API server certificate");
            status.step("using existing API server certificate and key");
            Ok((loaded.pair, ProvisioningOutcome::Reused))
        }
        StoreState::Absent => {
            let pair = authority::generate_signed_leaf(ca, APISERVER_COMMON_NAME, required)
                .map_err(|source| ProvisionError::SigningFailed { role, source })?;
            store
                .save(role.base_name(), &pair)
                .map_err(|source| ProvisionError::PersistFailed {
                    role,
                    dir: store.dir().to_path_buf(),
                    source,
                })?;
            info!(dir = %store.dir().display(), "generated API server certificate");
            status.step("generated API server certificate and key");
            Ok((pair, ProvisioningOutcome::Generated))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;
    use crate::report::RecordingStatus;

    fn required_sans() -> SanSet {
        let mut sans = SanSet::default();
        sans.dns_names.insert("example.com".to_string());
        sans.dns_names.insert("api".to_string());
        sans.ip_addrs.insert("10.96.0.1".parse().unwrap());
        sans
    }

    fn non_ca_pair() -> CredentialPair {
        let params = rcgen::CertificateParams::new(vec!["plain-leaf".to_string()])
            .expect("params");
        let key = rcgen::KeyPair::generate().expect("key pair");
        let cert = params.self_signed(&key).expect("self signed");
        CredentialPair {
            cert_pem: cert.pem(),
            key_pem: key.serialize_pem(),
        }
    }

    #[test]
    fn test_ca_generated_then_reused_without_rewrite() {
        let dir = tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("pki"));
        let mut status = RecordingStatus::default();

        let (first, outcome) = ensure_certificate_authority(&store, &mut status).unwrap();
        assert_eq!(outcome, ProvisioningOutcome::Generated);
        let cert_bytes = fs::read(store.cert_path("ca")).unwrap();
        let key_bytes = fs::read(store.key_path("ca")).unwrap();

        let (second, outcome) = ensure_certificate_authority(&store, &mut status).unwrap();
        assert_eq!(outcome, ProvisioningOutcome::Reused);
        assert_eq!(first.cert_pem, second.cert_pem);
        assert_eq!(cert_bytes, fs::read(store.cert_path("ca")).unwrap());
        assert_eq!(key_bytes, fs::read(store.key_path("ca")).unwrap());

        assert_eq!(
            status.lines,
            vec![
                "generated CA certificate and key",
                "using existing CA certificate and key"
            ]
        );
    }

    #[test]
    fn test_lone_key_file_is_fatal_and_untouched() {
        let dir = tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        fs::write(store.key_path("ca"), "stray key").unwrap();
        let mut status = RecordingStatus::default();

        let err = ensure_certificate_authority(&store, &mut status).unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::IncompleteCredential { missing, .. } if missing == "ca.crt"
        ));

        // nothing modified, nothing created
        assert_eq!(fs::read_to_string(store.key_path("ca")).unwrap(), "stray key");
        assert!(!store.cert_path("ca").exists());
        assert!(status.lines.is_empty());
    }

    #[test]
    fn test_unparseable_pair_is_fatal_and_untouched() {
        let dir = tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        fs::write(store.cert_path("ca"), "garbage cert").unwrap();
        fs::write(store.key_path("ca"), "garbage key").unwrap();
        let mut status = RecordingStatus::default();

        let err = ensure_certificate_authority(&store, &mut status).unwrap_err();
        assert!(matches!(err, ProvisionError::CorruptCredential { .. }));
        assert_eq!(
            fs::read_to_string(store.cert_path("ca")).unwrap(),
            "garbage cert"
        );
    }

    #[test]
    fn test_stored_non_ca_certificate_is_rejected_not_replaced() {
        let dir = tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("pki"));
        let impostor = non_ca_pair();
        store.save("ca", &impostor).unwrap();
        let mut status = RecordingStatus::default();

        let err = ensure_certificate_authority(&store, &mut status).unwrap_err();
        assert!(matches!(err, ProvisionError::NotACertificateAuthority { .. }));

        let kept = fs::read_to_string(store.cert_path("ca")).unwrap();
        assert_eq!(kept, impostor.cert_pem);
    }

    #[test]
    fn test_server_generated_then_reused() {
        let dir = tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("pki"));
        let mut status = RecordingStatus::default();
        let (ca, _) = ensure_certificate_authority(&store, &mut status).unwrap();
        let required = required_sans();

        let (_, outcome) =
            ensure_server_certificate(&store, &ca, &required, &mut status).unwrap();
        assert_eq!(outcome, ProvisioningOutcome::Generated);
        let cert_bytes = fs::read(store.cert_path("apiserver")).unwrap();

        let (_, outcome) =
            ensure_server_certificate(&store, &ca, &required, &mut status).unwrap();
        assert_eq!(outcome, ProvisioningOutcome::Reused);
        assert_eq!(cert_bytes, fs::read(store.cert_path("apiserver")).unwrap());
    }

    #[test]
    fn test_reused_server_certificate_must_cover_current_requirement() {
        let dir = tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("pki"));
        let mut status = RecordingStatus::default();
        let (ca, _) = ensure_certificate_authority(&store, &mut status).unwrap();

        let required = required_sans();
        ensure_server_certificate(&store, &ca, &required, &mut status).unwrap();

        let mut grown = required;
        grown.dns_names.insert("added.example.com".to_string());
        let err = ensure_server_certificate(&store, &ca, &grown, &mut status).unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::StaleServerCertificate { missing, .. }
                if missing.contains("added.example.com")
        ));

        // the stored pair survives for the operator to deal with
        assert!(store.cert_path("apiserver").exists());
        assert!(store.key_path("apiserver").exists());
    }
}
