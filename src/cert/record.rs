//! Decoded view of an issued certificate.

use crate::cert::builder::{
    chrono_time, distribution_points_of, find_extension, serial_to_hex, SubjectAltNames,
};
use crate::cert::subject::Subject;
use crate::config::DistributionPoints;
use crate::error::Result;
use chrono::{DateTime, Utc};
use const_oid::ObjectIdentifier;
use x509_cert::certificate::Certificate;
use x509_cert::ext::pkix::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, KeyUsages,
    SubjectAltName, SubjectKeyIdentifier,
};
use x509_cert::serial_number::SerialNumber;

/// The fields of a certificate the toolkit reasons about.
#[derive(Debug, Clone)]
pub struct CertificateRecord {
    pub serial: SerialNumber,
    pub issuer: Subject,
    pub subject: Subject,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub key_usage: Option<KeyUsage>,
    pub extended_key_usage: Vec<ObjectIdentifier>,
    pub is_ca: bool,
    pub subject_key_id: Option<Vec<u8>>,
    pub authority_key_id: Option<Vec<u8>>,
    pub distribution: DistributionPoints,
    pub sans: SubjectAltNames,
}

impl CertificateRecord {
    /// Decode the record from a parsed certificate.
    ///
    /// Fails with `InputError` when one of the understood extensions is
    /// malformed; unknown extensions are ignored.
    pub fn from_certificate(cert: &Certificate) -> Result<Self> {
        let tbs = &cert.tbs_certificate;
        let extensions = tbs.extensions.as_ref();

        let key_usage = find_extension::<KeyUsage>(extensions)?.map(|(_, ku)| ku);
        let extended_key_usage = find_extension::<ExtendedKeyUsage>(extensions)?
            .map(|(_, ExtendedKeyUsage(oids))| oids)
            .unwrap_or_default();
        let is_ca = find_extension::<BasicConstraints>(extensions)?
            .map(|(_, bc)| bc.ca)
            .unwrap_or(false);
        let subject_key_id = find_extension::<SubjectKeyIdentifier>(extensions)?
            .map(|(_, SubjectKeyIdentifier(id))| id.as_bytes().to_vec());
        let authority_key_id = find_extension::<AuthorityKeyIdentifier>(extensions)?
            .and_then(|(_, aki)| aki.key_identifier)
            .map(|id| id.as_bytes().to_vec());
        let sans = find_extension::<SubjectAltName>(extensions)?
            .map(|(_, SubjectAltName(names))| SubjectAltNames::from_general_names(&names))
            .unwrap_or_default();

        Ok(Self {
            serial: tbs.serial_number.clone(),
            issuer: Subject::from_name(&tbs.issuer),
            subject: Subject::from_name(&tbs.subject),
            not_before: chrono_time(&tbs.validity.not_before)?,
            not_after: chrono_time(&tbs.validity.not_after)?,
            key_usage,
            extended_key_usage,
            is_ca,
            subject_key_id,
            authority_key_id,
            distribution: distribution_points_of(extensions)?,
            sans,
        })
    }

    pub fn has_key_usage(&self, usage: KeyUsages) -> bool {
        self.key_usage
            .as_ref()
            .map(|ku| ku.0.contains(usage))
            .unwrap_or(false)
    }

    /// Serial as uppercase hex, at least 16 digits.
    pub fn serial_hex(&self) -> String {
        serial_to_hex(&self.serial)
    }

    /// Email addresses from the subjectAltName extension.
    pub fn emails(&self) -> &[String] {
        &self.sans.email_addresses
    }
}
