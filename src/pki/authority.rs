use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, Issuer, KeyPair,
    KeyUsagePurpose, SanType,
};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::pki::san::SanSet;

const ORGANIZATION: &str = "rootplane";
const CA_COMMON_NAME: &str = "rootplane cluster CA";
const CA_VALIDITY_DAYS: i64 = 3650;
const SERVER_VALIDITY_DAYS: i64 = 365;

/// A private key and its certificate, both PEM-encoded.
///
/// The key never leaves the local store; the certificate is the public half.
#[derive(Debug, Clone)]
pub struct CredentialPair {
    pub cert_pem: String,
    pub key_pem: String,
}

/// Facts read back out of a stored certificate.
#[derive(Debug, Clone)]
pub struct CertificateFacts {
    pub is_ca: bool,
    pub sans: SanSet,
}

#[derive(Debug, Error)]
#[error("not a valid PEM-encoded X.509 certificate")]
pub struct MalformedCertificate;

/// Generates a fresh self-signed certificate authority pair.
///
/// # Errors
/// Returns error if key generation or self-signing fails.
pub fn generate_self_signed_ca() -> Result<CredentialPair, rcgen::Error> {
    let mut params = CertificateParams::default();
    params
        .distinguished_name
        .push(DnType::CommonName, CA_COMMON_NAME);
    params
        .distinguished_name
        .push(DnType::OrganizationName, ORGANIZATION);
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::DigitalSignature,
    ];
    let now = OffsetDateTime::now_utc();
    params.not_before = now;
    params.not_after = now + Duration::days(CA_VALIDITY_DAYS);

    let key = KeyPair::generate()?;
    let cert = params.self_signed(&key)?;
    debug!("generated self-signed cluster CA");

    Ok(CredentialPair {
        cert_pem: cert.pem(),
        key_pem: key.serialize_pem(),
    })
}

/// Generates a server certificate signed by `signer`, bound to `sans` with
/// the `ServerAuth` extended key usage.
///
/// # Errors
/// Returns error if the signer cannot be reconstructed from its PEM forms,
/// or if key generation or signing fails.
pub fn generate_signed_leaf(
    signer: &CredentialPair,
    common_name: &str,
    sans: &SanSet,
) -> Result<CredentialPair, rcgen::Error> {
    let mut params = CertificateParams::default();
    params
        .distinguished_name
        .push(DnType::CommonName, common_name);
    params
        .distinguished_name
        .push(DnType::OrganizationName, ORGANIZATION);
    params.is_ca = IsCa::ExplicitNoCa;
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
    ];
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
    let now = OffsetDateTime::now_utc();
    params.not_before = now;
    params.not_after = now + Duration::days(SERVER_VALIDITY_DAYS);

    for name in &sans.dns_names {
        params
            .subject_alt_names
            .push(SanType::DnsName(name.clone().try_into()?));
    }
    for ip in &sans.ip_addrs {
        params.subject_alt_names.push(SanType::IpAddress(*ip));
    }

    let key = KeyPair::generate()?;
    let signer_key = KeyPair::from_pem(&signer.key_pem)?;
    let issuer = Issuer::from_ca_cert_pem(&signer.cert_pem, signer_key)?;
    let cert = params.signed_by(&key, &issuer)?;
    debug!(%common_name, "generated CA-signed server certificate");

    Ok(CredentialPair {
        cert_pem: cert.pem(),
        key_pem: key.serialize_pem(),
    })
}

/// Parses a stored certificate and reads back the facts provisioning cares
/// about: the CA bit and the subject alternative names.
///
/// # Errors
/// Returns [`MalformedCertificate`] if the PEM or the certificate inside it
/// does not parse.
pub fn inspect(cert_pem: &str) -> Result<CertificateFacts, MalformedCertificate> {
    let (_, pem) = x509_parser::pem::parse_x509_pem(cert_pem.as_bytes())
        .map_err(|_| MalformedCertificate)?;
    let (_, cert) =
        x509_parser::parse_x509_certificate(&pem.contents).map_err(|_| MalformedCertificate)?;

    let mut sans = SanSet::default();
    for extension in cert.extensions() {
        if let x509_parser::extensions::ParsedExtension::SubjectAlternativeName(san) =
            extension.parsed_extension()
        {
            for name in &san.general_names {
                match name {
                    x509_parser::extensions::GeneralName::DNSName(dns_name) => {
                        sans.dns_names.insert((*dns_name).to_string());
                    }
                    x509_parser::extensions::GeneralName::IPAddress(bytes) => {
                        if let Ok(octets) = <[u8; 4]>::try_from(*bytes) {
                            sans.ip_addrs.insert(octets.into());
                        } else if let Ok(octets) = <[u8; 16]>::try_from(*bytes) {
                            sans.ip_addrs.insert(octets.into());
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    Ok(CertificateFacts {
        is_ca: cert.is_ca(),
        sans,
    })
}
