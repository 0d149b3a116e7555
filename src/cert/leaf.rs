//! End-entity (and subordinate CA) certificate issuance.
//!
//! A leaf certificate is issued from a verified certificate signing request
//! and an existing CA certificate/key pair. Subject, names and key are taken
//! from the request as-is; the usage flags decide key usage, extended key
//! usage and the CA basic constraint.

use crate::cert::builder::{
    certificate_serial, distribution_point_extensions, distribution_points_of,
    ecdsa_sha256_algorithm, encode_extension, find_extension, now_utc, sign_certificate,
    subject_key_id, validity_from,
};
use crate::cert::request::CertificateRequest;
use crate::cert::subject::{single_rdn, EMAIL_ADDRESS_OID};
use crate::config::DistributionPoints;
use crate::crypto::ecdsa::Keypair;
use crate::crypto::random::random_serial;
use crate::error::Result;
use chrono::{DateTime, Utc};
use const_oid::db::rfc5280::{ID_KP_CLIENT_AUTH, ID_KP_CODE_SIGNING, ID_KP_SERVER_AUTH};
use der::asn1::OctetString;
use tracing::{debug, info, warn};
use x509_cert::certificate::{Certificate, TbsCertificate, Version};
use x509_cert::ext::pkix::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, KeyUsages,
    SubjectAltName, SubjectKeyIdentifier,
};

/// Independent, additive usage switches for a leaf certificate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageFlags {
    pub server: bool,
    pub client: bool,
    pub code_signing: bool,
    pub sub_ca: bool,
    pub crl_issuer: bool,
}

impl UsageFlags {
    /// Whether the subject should also carry the requester's email.
    fn wants_subject_email(&self) -> bool {
        self.client || self.code_signing
    }

    /// Key usage bits implied by the flags. Digital signature is always set.
    pub fn key_usage(&self) -> KeyUsage {
        let mut usage = KeyUsage(KeyUsages::DigitalSignature.into());
        if self.server || self.client || self.code_signing {
            usage.0 |= KeyUsages::KeyEncipherment;
        }
        if self.sub_ca {
            usage.0 |= KeyUsages::KeyCertSign;
            usage.0 |= KeyUsages::CRLSign;
        }
        if self.crl_issuer {
            usage.0 |= KeyUsages::CRLSign;
        }
        usage
    }

    /// Extended key usage purposes, in server, client, code signing order.
    pub fn extended_key_usage(&self) -> ExtendedKeyUsage {
        let mut purposes = Vec::new();
        if self.server {
            purposes.push(ID_KP_SERVER_AUTH);
        }
        if self.client {
            purposes.push(ID_KP_CLIENT_AUTH);
        }
        if self.code_signing {
            purposes.push(ID_KP_CODE_SIGNING);
        }
        ExtendedKeyUsage(purposes)
    }
}

/// Issuance policy for a leaf certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafIntent {
    pub usage: UsageFlags,
    pub validity_days: u32,
    /// Explicit URIs; an empty list inherits the issuing CA's.
    pub distribution: DistributionPoints,
}

/// Build the to-be-signed leaf certificate with a fresh random serial,
/// valid from now.
///
/// Fails with `SignatureError` when the request's self-signature does not
/// verify.
pub fn build_leaf_template(
    request: &CertificateRequest,
    ca_cert: &Certificate,
    intent: &LeafIntent,
) -> Result<TbsCertificate> {
    build_leaf_template_at(request, ca_cert, intent, random_serial(), now_utc())
}

/// Build the to-be-signed leaf certificate for a given serial and start time.
pub fn build_leaf_template_at(
    request: &CertificateRequest,
    ca_cert: &Certificate,
    intent: &LeafIntent,
    serial: u128,
    not_before: DateTime<Utc>,
) -> Result<TbsCertificate> {
    request.verify()?;

    let ca_tbs = &ca_cert.tbs_certificate;
    let spki = request.public_key_info().clone();
    let sans = request.subject_alt_names()?;
    let usage = intent.usage;

    let mut subject = request.name().clone();
    if usage.wants_subject_email() {
        match sans.email_addresses.first() {
            Some(email) => subject.0.push(single_rdn(EMAIL_ADDRESS_OID, email)?),
            None => warn!(
                subject = %subject,
                "request carries no email address; subject left without emailAddress"
            ),
        }
    }

    let mut extensions = vec![
        encode_extension(
            &BasicConstraints {
                ca: usage.sub_ca,
                path_len_constraint: None,
            },
            true,
        )?,
        encode_extension(&usage.key_usage(), true)?,
    ];

    let eku = usage.extended_key_usage();
    if !eku.0.is_empty() {
        extensions.push(encode_extension(&eku, false)?);
    }

    extensions.push(encode_extension(
        &SubjectKeyIdentifier(OctetString::new(subject_key_id(&spki)?)?),
        false,
    )?);
    extensions.push(encode_extension(
        &AuthorityKeyIdentifier {
            key_identifier: Some(OctetString::new(issuer_key_id(ca_cert)?)?),
            authority_cert_issuer: None,
            authority_cert_serial_number: None,
        },
        false,
    )?);

    if !sans.is_empty() {
        let critical = subject.0.is_empty();
        extensions.push(encode_extension(
            &SubjectAltName(sans.to_general_names()?),
            critical,
        )?);
    }

    let distribution = effective_distribution(&intent.distribution, ca_cert)?;
    extensions.extend(distribution_point_extensions(&distribution)?);

    debug!(serial = %format!("{:X}", serial), ?usage, "drew leaf serial");

    Ok(TbsCertificate {
        version: Version::V3,
        serial_number: certificate_serial(serial)?,
        signature: ecdsa_sha256_algorithm(),
        issuer: ca_tbs.subject.clone(),
        validity: validity_from(not_before, intent.validity_days)?,
        subject,
        subject_public_key_info: spki,
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: Some(extensions),
    })
}

/// Issue a leaf certificate from a request, signed by the CA key.
///
/// # Example
///
/// ```
/// use cert_tools::cert::ca::{create_ca_certificate, CaIntent};
/// use cert_tools::cert::leaf::{create_leaf_certificate, LeafIntent, UsageFlags};
/// use cert_tools::cert::request::{create_certificate_request, RequestIntent};
/// use cert_tools::cert::subject::SubjectBuilder;
/// use cert_tools::config::DistributionPoints;
/// use cert_tools::crypto::ecdsa::generate_p256_keypair;
///
/// # fn example() -> cert_tools::error::Result<()> {
/// let ca_key = generate_p256_keypair()?;
/// let ca = create_ca_certificate(
///     &CaIntent {
///         subject: SubjectBuilder::new().common_name("Root").build(),
///         hosts: vec![],
///         emails: vec!["pki@example.com".to_string()],
///         validity_days: 3650,
///         distribution: DistributionPoints::default(),
///     },
///     &ca_key,
/// )?;
///
/// let user_key = generate_p256_keypair()?;
/// let csr = create_certificate_request(
///     &RequestIntent {
///         subject: SubjectBuilder::new().common_name("alice").build(),
///         hosts: vec![],
///         emails: vec!["alice@example.com".to_string()],
///     },
///     &user_key,
/// )?;
///
/// let intent = LeafIntent {
///     usage: UsageFlags { client: true, ..Default::default() },
///     validity_days: 90,
///     distribution: DistributionPoints::default(),
/// };
/// let cert = create_leaf_certificate(&csr, &ca, &ca_key, &intent)?;
/// assert_eq!(cert.tbs_certificate.issuer, ca.tbs_certificate.subject);
/// # Ok(())
/// # }
/// ```
pub fn create_leaf_certificate(
    request: &CertificateRequest,
    ca_cert: &Certificate,
    ca_keypair: &Keypair,
    intent: &LeafIntent,
) -> Result<Certificate> {
    let tbs = build_leaf_template(request, ca_cert, intent)?;
    let cert = sign_certificate(tbs, ca_keypair)?;
    info!(
        subject = %cert.tbs_certificate.subject,
        issuer = %cert.tbs_certificate.issuer,
        "issued leaf certificate"
    );
    Ok(cert)
}

/// Key identifier of the issuing CA: its own SKI extension if present,
/// otherwise the hash of its public key.
fn issuer_key_id(ca_cert: &Certificate) -> Result<Vec<u8>> {
    let ca_tbs = &ca_cert.tbs_certificate;
    match find_extension::<SubjectKeyIdentifier>(ca_tbs.extensions.as_ref())? {
        Some((_, SubjectKeyIdentifier(ski))) => Ok(ski.as_bytes().to_vec()),
        None => subject_key_id(&ca_tbs.subject_public_key_info),
    }
}

/// Explicit URIs win; each empty list falls back to the CA's own.
fn effective_distribution(
    explicit: &DistributionPoints,
    ca_cert: &Certificate,
) -> Result<DistributionPoints> {
    let inherited = distribution_points_of(ca_cert.tbs_certificate.extensions.as_ref())?;

    let crl_uris = if explicit.crl_uris.is_empty() {
        inherited.crl_uris
    } else {
        explicit.crl_uris.clone()
    };
    let ca_issuer_uris = if explicit.ca_issuer_uris.is_empty() {
        inherited.ca_issuer_uris
    } else {
        explicit.ca_issuer_uris.clone()
    };

    Ok(DistributionPoints::new(crl_uris, ca_issuer_uris))
}
