//! Certificate revocation lists.
//!
//! A CRL is built from a CA certificate, its key and a list of revoked
//! serials read from a two-column text file (`HEXSERIAL,RFC3339`). The
//! window is fixed: nextUpdate is always thisUpdate plus
//! [`CRL_VALIDITY_DAYS`].

use crate::cert::builder::{
    ecdsa_sha256_algorithm, encode_extension, encode_output, find_extension,
    now_utc, serial_from_hex, sign_tbs, subject_key_id, x509_time,
};
use crate::config::{OutputFormat, CRL_VALIDITY_DAYS};
use crate::crypto::ecdsa::Keypair;
use crate::error::{CertToolError, Result};
use chrono::{DateTime, Duration, Utc};
use der::asn1::{OctetString, Uint};
use der::Encode;
use tracing::{debug, info};
use x509_cert::certificate::{Certificate, Version};
use x509_cert::crl::{CertificateList, RevokedCert, TbsCertList};
use x509_cert::ext::pkix::{AuthorityKeyIdentifier, CrlNumber, SubjectKeyIdentifier};
use x509_cert::serial_number::SerialNumber;

/// PEM label of a CRL.
pub const CRL_LABEL: &str = "X509 CRL";

/// One revoked certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationEntry {
    pub serial: SerialNumber,
    pub revoked_at: DateTime<Utc>,
}

impl RevocationEntry {
    /// Parse one `HEXSERIAL,RFC3339` record.
    ///
    /// # Example
    ///
    /// ```
    /// use cert_tools::cert::crl::RevocationEntry;
    ///
    /// let entry = RevocationEntry::parse_record("00AB,2024-01-01T00:00:00Z").unwrap();
    /// assert_eq!(entry.revoked_at.to_rfc3339(), "2024-01-01T00:00:00+00:00");
    /// ```
    pub fn parse_record(record: &str) -> Result<Self> {
        let fields: Vec<&str> = record.split(',').map(str::trim).collect();
        if fields.len() != 2 {
            return Err(CertToolError::ParseError(format!(
                "Expected 2 fields, found {} in '{}'",
                fields.len(),
                record
            )));
        }

        let serial = serial_from_hex(fields[0])?;
        let revoked_at = DateTime::parse_from_rfc3339(fields[1])
            .map_err(|e| {
                CertToolError::ParseError(format!("Invalid revocation time '{}': {}", fields[1], e))
            })?
            .with_timezone(&Utc);

        Ok(Self { serial, revoked_at })
    }
}

/// Parse a whole revocation file. Blank lines are skipped; any malformed
/// record fails the whole parse.
pub fn parse_revocation_list(input: &str) -> Result<Vec<RevocationEntry>> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            RevocationEntry::parse_record(line).map_err(|e| match e {
                CertToolError::ParseError(msg) => {
                    CertToolError::ParseError(format!("line {}: {}", index + 1, msg))
                }
                other => other,
            })
        })
        .collect()
}

/// Build the to-be-signed CRL issued at `this_update`.
pub fn build_crl_template_at(
    ca_cert: &Certificate,
    entries: &[RevocationEntry],
    this_update: DateTime<Utc>,
) -> Result<TbsCertList> {
    let ca_tbs = &ca_cert.tbs_certificate;
    let next_update = this_update + Duration::days(i64::from(CRL_VALIDITY_DAYS));

    let key_id = match find_extension::<SubjectKeyIdentifier>(ca_tbs.extensions.as_ref())? {
        Some((_, SubjectKeyIdentifier(ski))) => ski.as_bytes().to_vec(),
        None => subject_key_id(&ca_tbs.subject_public_key_info)?,
    };
    let crl_number = u128::try_from(this_update.timestamp()).map_err(|_| {
        CertToolError::EncodingError(format!("CRL time {} predates the Unix epoch", this_update))
    })?;

    let mut revoked = Vec::with_capacity(entries.len());
    for entry in entries {
        revoked.push(RevokedCert {
            serial_number: entry.serial.clone(),
            revocation_date: x509_time(entry.revoked_at)?,
            crl_entry_extensions: None,
        });
    }

    let extensions = vec![
        encode_extension(
            &AuthorityKeyIdentifier {
                key_identifier: Some(OctetString::new(key_id)?),
                authority_cert_issuer: None,
                authority_cert_serial_number: None,
            },
            false,
        )?,
        encode_extension(&CrlNumber(Uint::new(&crl_number.to_be_bytes())?), false)?,
    ];

    debug!(entries = revoked.len(), "assembled revocation list");

    Ok(TbsCertList {
        version: Version::V2,
        signature: ecdsa_sha256_algorithm(),
        issuer: ca_tbs.subject.clone(),
        this_update: x509_time(this_update)?,
        next_update: Some(x509_time(next_update)?),
        revoked_certificates: if revoked.is_empty() {
            None
        } else {
            Some(revoked)
        },
        crl_extensions: Some(extensions),
    })
}

/// Build and sign a CRL valid from now for the fixed window.
pub fn create_crl(
    ca_cert: &Certificate,
    ca_keypair: &Keypair,
    entries: &[RevocationEntry],
) -> Result<CertificateList> {
    let tbs = build_crl_template_at(ca_cert, entries, now_utc())?;
    let signature = sign_tbs(&tbs, ca_keypair)?;

    info!(
        issuer = %tbs.issuer,
        revoked = entries.len(),
        "issued certificate revocation list"
    );

    Ok(CertificateList {
        signature_algorithm: tbs.signature.clone(),
        tbs_cert_list: tbs,
        signature,
    })
}

/// Encode a CRL as PEM (`X509 CRL`) or raw DER.
pub fn crl_to_output(crl: &CertificateList, format: OutputFormat) -> Result<Vec<u8>> {
    let der = crl
        .to_der()
        .map_err(|e| CertToolError::EncodingError(format!("Failed to encode CRL: {}", e)))?;
    Ok(encode_output(der, CRL_LABEL, format))
}
