use std::fmt;

use tracing::info;

use crate::config::Settings;
use crate::host::HostInfo;
use crate::report::StatusSink;

pub mod authority;
pub mod coverage;
pub mod error;
pub mod provision;
pub mod san;
pub mod store;

pub use authority::CredentialPair;
pub use error::ProvisionError;
pub use provision::ProvisioningOutcome;
pub use san::SanSet;

use store::{CredentialStore, LoadedCredential, StoreState};

pub const CA_BASE_NAME: &str = "ca";
pub const APISERVER_BASE_NAME: &str = "apiserver";
pub const APISERVER_COMMON_NAME: &str = "rootplane-apiserver";

/// Which of the two credential pairs an operation concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialRole {
    CertificateAuthority,
    ServerLeaf,
}

impl CredentialRole {
    /// File base name of the role's pair inside the PKI directory.
    #[must_use]
    pub fn base_name(self) -> &'static str {
        match self {
            Self::CertificateAuthority => CA_BASE_NAME,
            Self::ServerLeaf => APISERVER_BASE_NAME,
        }
    }
}

impl fmt::Display for CredentialRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CertificateAuthority => write!(f, "cluster CA"),
            Self::ServerLeaf => write!(f, "API server"),
        }
    }
}

/// Provisions all PKI trust material the control plane needs to start:
/// the cluster CA and the API server certificate signed by it.
///
/// Callable repeatedly against the same PKI directory: valid existing
/// material is reused untouched, an empty directory is populated, and
/// anything ambiguous or invalid aborts the run without modifying the
/// store. Any failure leaves files already durably written in place.
///
/// # Errors
/// See [`ProvisionError`]; every failure is fatal to the run.
pub fn provision_control_plane(
    settings: &Settings,
    host: &dyn HostInfo,
    status: &mut dyn StatusSink,
) -> Result<(), ProvisionError> {
    let required = san::assemble(settings, host)?;
    info!(
        dns_names = required.dns_names.len(),
        ip_addrs = required.ip_addrs.len(),
        "assembled API server SAN set"
    );

    let store = CredentialStore::new(&settings.paths.pki);
    let (ca, _) = provision::ensure_certificate_authority(&store, status)?;
    provision::ensure_server_certificate(&store, &ca, &required, status)?;

    status.step(&format!(
        "valid certificates and keys now exist in {}",
        store.dir().display()
    ));
    Ok(())
}

/// Read-only check that already-provisioned material satisfies the current
/// configuration: both pairs load, the CA certificate carries the CA bit,
/// and the server certificate covers the freshly computed SAN set.
///
/// # Errors
/// The same load-phase errors as provisioning, plus
/// [`ProvisionError::NotProvisioned`] when a pair is absent entirely.
/// Never modifies the store.
pub fn verify_control_plane(settings: &Settings, host: &dyn HostInfo) -> Result<(), ProvisionError> {
    let required = san::assemble(settings, host)?;
    let store = CredentialStore::new(&settings.paths.pki);

    let ca = load_for_verify(&store, CredentialRole::CertificateAuthority)?;
    if !ca.is_ca {
        return Err(ProvisionError::NotACertificateAuthority {
            path: store.cert_path(CA_BASE_NAME),
        });
    }

    let server = load_for_verify(&store, CredentialRole::ServerLeaf)?;
    if !coverage::covers(&server.sans, &required) {
        return Err(ProvisionError::StaleServerCertificate {
            path: store.cert_path(APISERVER_BASE_NAME),
            missing: coverage::missing(&server.sans, &required).to_string(),
        });
    }

    Ok(())
}

fn load_for_verify(
    store: &CredentialStore,
    role: CredentialRole,
) -> Result<LoadedCredential, ProvisionError> {
    match store.probe(role.base_name()) {
        StoreState::Absent => Err(ProvisionError::NotProvisioned {
            role,
            dir: store.dir().to_path_buf(),
        }),
        StoreState::Partial { missing } => Err(ProvisionError::IncompleteCredential {
            role,
            dir: store.dir().to_path_buf(),
            missing,
        }),
        StoreState::Present => {
            store
                .load(role.base_name())
                .map_err(|source| ProvisionError::CorruptCredential {
                    role,
                    dir: store.dir().to_path_buf(),
                    source,
                })
        }
    }
}
