//! Root CA certificate operations.
//!
//! This module builds the template for a self-signed root CA and signs it
//! with the CA's own key.

use crate::cert::builder::{
    certificate_serial, distribution_point_extensions, ecdsa_sha256_algorithm, encode_extension,
    now_utc, sign_certificate, subject_key_id, validity_from, SubjectAltNames,
};
use crate::cert::subject::Subject;
use crate::config::DistributionPoints;
use crate::crypto::ecdsa::Keypair;
use crate::crypto::random::random_serial;
use crate::error::Result;
use chrono::{DateTime, Utc};
use der::asn1::OctetString;
use tracing::{debug, info};
use x509_cert::certificate::{Certificate, TbsCertificate, Version};
use x509_cert::ext::pkix::{
    BasicConstraints, KeyUsage, KeyUsages, SubjectAltName, SubjectKeyIdentifier,
};

/// What goes into a root CA certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaIntent {
    pub subject: Subject,
    /// DNS names or IP literals.
    pub hosts: Vec<String>,
    pub emails: Vec<String>,
    pub validity_days: u32,
    pub distribution: DistributionPoints,
}

/// Build the to-be-signed root CA certificate with a fresh random serial,
/// valid from now.
pub fn build_ca_template(intent: &CaIntent, keypair: &Keypair) -> Result<TbsCertificate> {
    build_ca_template_at(intent, keypair, random_serial(), now_utc())
}

/// Build the to-be-signed root CA certificate for a given serial and start
/// time.
///
/// The certificate is self-issued (issuer = subject), always carries the CA
/// basic constraint, and may sign certificates, CRLs and data.
pub fn build_ca_template_at(
    intent: &CaIntent,
    keypair: &Keypair,
    serial: u128,
    not_before: DateTime<Utc>,
) -> Result<TbsCertificate> {
    let subject = intent.subject.to_name()?;
    let spki = keypair.public_key_info()?;
    let ski = subject_key_id(&spki)?;
    let sans = SubjectAltNames::from_hosts(&intent.hosts, &intent.emails);

    let key_usage = KeyUsage(
        KeyUsages::KeyCertSign | KeyUsages::DigitalSignature | KeyUsages::CRLSign,
    );

    let mut extensions = vec![
        encode_extension(
            &BasicConstraints {
                ca: true,
                path_len_constraint: None,
            },
            true,
        )?,
        encode_extension(&key_usage, true)?,
        encode_extension(&SubjectKeyIdentifier(OctetString::new(ski)?), false)?,
    ];
    if !sans.is_empty() {
        let critical = subject.0.is_empty();
        extensions.push(encode_extension(
            &SubjectAltName(sans.to_general_names()?),
            critical,
        )?);
    }
    extensions.extend(distribution_point_extensions(&intent.distribution)?);

    debug!(serial = %format!("{:X}", serial), "drew CA serial");

    Ok(TbsCertificate {
        version: Version::V3,
        serial_number: certificate_serial(serial)?,
        signature: ecdsa_sha256_algorithm(),
        issuer: subject.clone(),
        validity: validity_from(not_before, intent.validity_days)?,
        subject,
        subject_public_key_info: spki,
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: Some(extensions),
    })
}

/// Create a self-signed root CA certificate.
///
/// # Example
///
/// ```
/// use cert_tools::cert::ca::{create_ca_certificate, CaIntent};
/// use cert_tools::cert::subject::SubjectBuilder;
/// use cert_tools::config::DistributionPoints;
/// use cert_tools::crypto::ecdsa::generate_p256_keypair;
///
/// # fn example() -> cert_tools::error::Result<()> {
/// let keypair = generate_p256_keypair()?;
/// let intent = CaIntent {
///     subject: SubjectBuilder::new().common_name("Example Root CA").build(),
///     hosts: vec![],
///     emails: vec!["pki@example.com".to_string()],
///     validity_days: 3650,
///     distribution: DistributionPoints::default(),
/// };
/// let cert = create_ca_certificate(&intent, &keypair)?;
/// assert_eq!(cert.tbs_certificate.issuer, cert.tbs_certificate.subject);
/// # Ok(())
/// # }
/// ```
pub fn create_ca_certificate(intent: &CaIntent, keypair: &Keypair) -> Result<Certificate> {
    let tbs = build_ca_template(intent, keypair)?;
    let cert = sign_certificate(tbs, keypair)?;
    info!(subject = %cert.tbs_certificate.subject, "issued root CA certificate");
    Ok(cert)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::record::CertificateRecord;
    use crate::cert::subject::{AttributeList, SubjectBuilder};
    use crate::crypto::ecdsa::generate_p256_keypair;
    use der::Encode;
    use sha2::{Digest, Sha256};

    fn intent() -> CaIntent {
        CaIntent {
            subject: SubjectBuilder::new()
                .country(AttributeList::from_comma_separated("GB"))
                .organization(AttributeList::from_comma_separated("Example Ltd"))
                .common_name("Test Root CA")
                .build(),
            hosts: vec!["ca.example.com".to_string(), "10.0.0.1".to_string()],
            emails: vec!["pki@example.com".to_string()],
            validity_days: 365,
            distribution: DistributionPoints::default(),
        }
    }

    #[test]
    fn test_create_ca_certificate_success() {
        let keypair = generate_p256_keypair().unwrap();
        let result = create_ca_certificate(&intent(), &keypair);
        assert!(result.is_ok());
    }

    #[test]
    fn test_root_ca_is_ca_with_all_usages() {
        let keypair = generate_p256_keypair().unwrap();
        let cert = create_ca_certificate(&intent(), &keypair).unwrap();
        let record = CertificateRecord::from_certificate(&cert).unwrap();

        assert!(record.is_ca);
        assert!(record.has_key_usage(KeyUsages::KeyCertSign));
        assert!(record.has_key_usage(KeyUsages::DigitalSignature));
        assert!(record.has_key_usage(KeyUsages::CRLSign));
        assert!(record.extended_key_usage.is_empty());
    }

    #[test]
    fn test_root_ca_is_self_issued() {
        let keypair = generate_p256_keypair().unwrap();
        let cert = create_ca_certificate(&intent(), &keypair).unwrap();
        assert_eq!(cert.tbs_certificate.issuer, cert.tbs_certificate.subject);
    }

    #[test]
    fn test_root_ca_signature_verifies() {
        let keypair = generate_p256_keypair().unwrap();
        let cert = create_ca_certificate(&intent(), &keypair).unwrap();

        let tbs_der = cert.tbs_certificate.to_der().unwrap();
        let signature =
            p256::ecdsa::DerSignature::from_bytes(cert.signature.raw_bytes()).unwrap();
        assert!(keypair.verify(&tbs_der, &signature).is_ok());
    }

    #[test]
    fn test_root_ca_subject_key_id() {
        let keypair = generate_p256_keypair().unwrap();
        let cert = create_ca_certificate(&intent(), &keypair).unwrap();
        let record = CertificateRecord::from_certificate(&cert).unwrap();

        let spki_der = cert.tbs_certificate.subject_public_key_info.to_der().unwrap();
        assert_eq!(record.subject_key_id, Some(Sha256::digest(spki_der).to_vec()));
    }

    #[test]
    fn test_root_ca_sans_split() {
        let keypair = generate_p256_keypair().unwrap();
        let cert = create_ca_certificate(&intent(), &keypair).unwrap();
        let record = CertificateRecord::from_certificate(&cert).unwrap();

        assert_eq!(record.sans.dns_names, vec!["ca.example.com"]);
        assert_eq!(record.sans.ip_addresses.len(), 1);
        assert_eq!(record.sans.email_addresses, vec!["pki@example.com"]);
    }

    #[test]
    fn test_root_ca_distribution_points() {
        let keypair = generate_p256_keypair().unwrap();

        let plain = create_ca_certificate(&intent(), &keypair).unwrap();
        let record = CertificateRecord::from_certificate(&plain).unwrap();
        assert!(record.distribution.crl_uris.is_empty());
        assert!(record.distribution.ca_issuer_uris.is_empty());

        let mut with_points = intent();
        with_points.distribution = DistributionPoints::new(
            vec!["http://crl.example.com/root.crl".to_string()],
            vec!["http://ca.example.com/root.p7c".to_string()],
        );
        let cert = create_ca_certificate(&with_points, &keypair).unwrap();
        let record = CertificateRecord::from_certificate(&cert).unwrap();
        assert_eq!(record.distribution, with_points.distribution);
    }

    #[test]
    fn test_validity_window() {
        let keypair = generate_p256_keypair().unwrap();
        let start = now_utc();
        let tbs = build_ca_template_at(&intent(), &keypair, 42, start).unwrap();

        let duration = tbs.validity.not_after.to_unix_duration()
            - tbs.validity.not_before.to_unix_duration();
        assert_eq!(duration.as_secs(), 365 * 24 * 60 * 60);
    }

    #[test]
    fn test_template_differs_only_in_serial() {
        let keypair = generate_p256_keypair().unwrap();
        let start = now_utc();

        let first = build_ca_template_at(&intent(), &keypair, 1, start).unwrap();
        let mut second = build_ca_template_at(&intent(), &keypair, 2, start).unwrap();
        assert_ne!(first.serial_number, second.serial_number);

        second.serial_number = first.serial_number.clone();
        assert_eq!(first.to_der().unwrap(), second.to_der().unwrap());
    }

    #[test]
    fn test_random_serials_differ() {
        let keypair = generate_p256_keypair().unwrap();
        let a = build_ca_template(&intent(), &keypair).unwrap();
        let b = build_ca_template(&intent(), &keypair).unwrap();
        assert_ne!(a.serial_number, b.serial_number);
    }
}
