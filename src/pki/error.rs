use std::path::PathBuf;

use thiserror::Error;

use crate::pki::CredentialRole;
use crate::pki::store::StoreError;

/// Fatal provisioning failures.
///
/// None of these are retried internally, and none trigger deletion or
/// regeneration of existing material: ambiguous or corrupt on-disk state is
/// reported for the operator to resolve deliberately.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("could not determine the local hostname")]
    InvalidHostname,

    #[error("advertise address {literal:?} is not a valid IP address")]
    InvalidIpLiteral { literal: String },

    #[error("service subnet {cidr:?} is not a valid CIDR block: {source}")]
    InvalidCidr {
        cidr: String,
        source: ipnet::AddrParseError,
    },

    #[error("cannot allocate the service virtual IP at offset {index} of {cidr:?}: block too small")]
    AddressAllocation { cidr: String, index: u32 },

    #[error("{role} credential in {} is incomplete: {missing} is missing", dir.display())]
    IncompleteCredential {
        role: CredentialRole,
        dir: PathBuf,
        missing: String,
    },

    #[error("{role} credential in {} exists but could not be loaded", dir.display())]
    CorruptCredential {
        role: CredentialRole,
        dir: PathBuf,
        source: StoreError,
    },

    #[error("stored certificate {} is not a certificate authority", path.display())]
    NotACertificateAuthority { path: PathBuf },

    #[error("stored server certificate {} no longer covers the required names: missing {missing}", path.display())]
    StaleServerCertificate { path: PathBuf, missing: String },

    #[error("failed to generate the {role} certificate and key")]
    SigningFailed {
        role: CredentialRole,
        source: rcgen::Error,
    },

    #[error("failed to persist the {role} credential in {}", dir.display())]
    PersistFailed {
        role: CredentialRole,
        dir: PathBuf,
        source: StoreError,
    },

    #[error("no {role} credential has been provisioned in {}", dir.display())]
    NotProvisioned { role: CredentialRole, dir: PathBuf },
}
