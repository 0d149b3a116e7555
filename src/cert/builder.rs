//! Certificate builder utilities.
//!
//! Helpers shared by the CA, leaf, request and CRL builders: serial numbers,
//! validity windows, key identifiers, subject alternative names, extension
//! encoding and signing of to-be-signed structures.

use crate::config::{DistributionPoints, OutputFormat};
use crate::crypto::ecdsa::Keypair;
use crate::crypto::random::serial_bytes;
use crate::error::{CertToolError, Result};
use chrono::{DateTime, TimeZone, Utc};
use const_oid::db::rfc5280::ID_AD_CA_ISSUERS;
use const_oid::db::rfc5912::ECDSA_WITH_SHA_256;
use const_oid::AssociatedOid;
use der::asn1::{BitString, GeneralizedTime, Ia5String, OctetString, UtcTime};
use der::{DecodeOwned, Encode};
use sha2::{Digest, Sha256};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use std::net::IpAddr;
use std::time::Duration;
use x509_cert::certificate::{Certificate, TbsCertificate};
use x509_cert::ext::pkix::crl::dp::DistributionPoint;
use x509_cert::ext::pkix::name::{DistributionPointName, GeneralName};
use x509_cert::ext::pkix::{AccessDescription, AuthorityInfoAccessSyntax, CrlDistributionPoints};
use x509_cert::ext::{Extension, Extensions};
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::{Time, Validity};

/// PEM label of an X.509 certificate.
pub const CERTIFICATE_LABEL: &str = "CERTIFICATE";

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// UTCTime can only represent years before 2050.
const UTC_TIME_LIMIT_YEAR: i32 = 2050;

/// Convert a 128-bit serial into an X.509 serial number.
pub fn certificate_serial(serial: u128) -> Result<SerialNumber> {
    SerialNumber::new(&serial_bytes(serial))
        .map_err(|e| CertToolError::EncodingError(format!("Failed to create serial number: {}", e)))
}

/// Parse a hexadecimal serial ("00AB", "ab", ...) into an X.509 serial number.
pub fn serial_from_hex(hex_serial: &str) -> Result<SerialNumber> {
    let trimmed = hex_serial.trim();
    if trimmed.is_empty() {
        return Err(CertToolError::ParseError("Empty serial number".to_string()));
    }

    let padded = if trimmed.len() % 2 == 1 {
        format!("0{}", trimmed)
    } else {
        trimmed.to_string()
    };
    let mut bytes = hex::decode(&padded)
        .map_err(|e| CertToolError::ParseError(format!("Invalid hex serial '{}': {}", trimmed, e)))?;

    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    bytes.drain(..first);
    if bytes[0] & 0x80 != 0 {
        bytes.insert(0, 0);
    }

    SerialNumber::new(&bytes)
        .map_err(|e| CertToolError::ParseError(format!("Serial '{}' out of range: {}", trimmed, e)))
}

/// Uppercase hex of a serial's magnitude, left-padded to at least 16 digits.
pub fn serial_to_hex(serial: &SerialNumber) -> String {
    let bytes = serial.as_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    format!("{:0>16}", hex::encode_upper(&bytes[first..]))
}

/// Current UTC time, truncated to whole seconds.
pub fn now_utc() -> DateTime<Utc> {
    let now = Utc::now();
    Utc.timestamp_opt(now.timestamp(), 0).single().unwrap_or(now)
}

/// Validity window starting at `not_before` and lasting `days` × 24h.
pub fn validity_from(not_before: DateTime<Utc>, days: u32) -> Result<Validity> {
    let not_after = not_before
        .checked_add_signed(chrono::Duration::seconds(
            i64::from(days) * SECONDS_PER_DAY as i64,
        ))
        .ok_or_else(|| {
            CertToolError::EncodingError(format!(
                "Validity of {} days from {} is out of range",
                days, not_before
            ))
        })?;
    Ok(Validity {
        not_before: x509_time(not_before)?,
        not_after: x509_time(not_after)?,
    })
}

/// Convert a chrono timestamp to an X.509 time (UTCTime before 2050,
/// GeneralizedTime from then on).
pub fn x509_time(time: DateTime<Utc>) -> Result<Time> {
    let secs = u64::try_from(time.timestamp()).map_err(|_| {
        CertToolError::EncodingError(format!("Time {} predates the Unix epoch", time))
    })?;
    let date_time = der::DateTime::from_unix_duration(Duration::from_secs(secs))?;

    if i32::from(date_time.year()) < UTC_TIME_LIMIT_YEAR {
        Ok(Time::UtcTime(UtcTime::from_date_time(date_time)?))
    } else {
        Ok(Time::GeneralTime(GeneralizedTime::from_date_time(date_time)))
    }
}

/// Convert an X.509 time to a chrono timestamp.
pub fn chrono_time(time: &Time) -> Result<DateTime<Utc>> {
    let secs = time.to_unix_duration().as_secs();
    let secs = i64::try_from(secs)
        .map_err(|_| CertToolError::ParseError(format!("Time out of range: {}", secs)))?;
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| CertToolError::ParseError(format!("Time out of range: {}", secs)))
}

/// SHA-256 over the DER encoding of a SubjectPublicKeyInfo.
///
/// The full 32-byte digest is the key identifier. It depends on the public
/// key alone, so recomputing it always gives the same value.
pub fn subject_key_id(spki: &SubjectPublicKeyInfoOwned) -> Result<Vec<u8>> {
    let der = spki.to_der()?;
    Ok(Sha256::digest(&der).to_vec())
}

/// DNS, IP and email subject alternative names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectAltNames {
    pub dns_names: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
    pub email_addresses: Vec<String>,
}

impl SubjectAltNames {
    /// Classify hosts: anything that parses as an IPv4/IPv6 literal is an IP
    /// address, everything else a DNS name. Order is kept within each list.
    ///
    /// # Example
    ///
    /// ```
    /// use cert_tools::cert::builder::SubjectAltNames;
    ///
    /// let sans = SubjectAltNames::from_hosts(
    ///     &["example.com".to_string(), "10.0.0.1".to_string()],
    ///     &["ops@example.com".to_string()],
    /// );
    /// assert_eq!(sans.dns_names, vec!["example.com"]);
    /// assert_eq!(sans.ip_addresses.len(), 1);
    /// ```
    pub fn from_hosts(hosts: &[String], emails: &[String]) -> Self {
        let mut sans = SubjectAltNames::default();
        for host in hosts.iter().filter(|h| !h.is_empty()) {
            match host.parse::<IpAddr>() {
                Ok(ip) => sans.ip_addresses.push(ip),
                Err(_) => sans.dns_names.push(host.clone()),
            }
        }
        sans.email_addresses = emails.iter().filter(|e| !e.is_empty()).cloned().collect();
        sans
    }

    pub fn is_empty(&self) -> bool {
        self.dns_names.is_empty() && self.ip_addresses.is_empty() && self.email_addresses.is_empty()
    }

    /// Encode as general names: DNS names, then IP addresses, then emails.
    pub fn to_general_names(&self) -> Result<Vec<GeneralName>> {
        let mut names = Vec::new();

        for dns in &self.dns_names {
            names.push(GeneralName::DnsName(ia5(dns)?));
        }
        for ip in &self.ip_addresses {
            let octets = match ip {
                IpAddr::V4(v4) => v4.octets().to_vec(),
                IpAddr::V6(v6) => v6.octets().to_vec(),
            };
            names.push(GeneralName::IpAddress(OctetString::new(octets)?));
        }
        for email in &self.email_addresses {
            names.push(GeneralName::Rfc822Name(ia5(email)?));
        }

        Ok(names)
    }

    /// Collect DNS, IP and email entries; other name forms are ignored.
    pub fn from_general_names(names: &[GeneralName]) -> Self {
        let mut sans = SubjectAltNames::default();
        for name in names {
            match name {
                GeneralName::DnsName(dns) => sans.dns_names.push(dns.to_string()),
                GeneralName::Rfc822Name(email) => sans.email_addresses.push(email.to_string()),
                GeneralName::IpAddress(octets) => {
                    if let Some(ip) = ip_from_octets(octets.as_bytes()) {
                        sans.ip_addresses.push(ip);
                    }
                }
                _ => {}
            }
        }
        sans
    }
}

fn ip_from_octets(octets: &[u8]) -> Option<IpAddr> {
    match octets.len() {
        4 => {
            let bytes: [u8; 4] = octets.try_into().ok()?;
            Some(IpAddr::from(bytes))
        }
        16 => {
            let bytes: [u8; 16] = octets.try_into().ok()?;
            Some(IpAddr::from(bytes))
        }
        _ => None,
    }
}

pub(crate) fn ia5(value: &str) -> Result<Ia5String> {
    Ia5String::new(value)
        .map_err(|e| CertToolError::EncodingError(format!("'{}' is not IA5 text: {}", value, e)))
}

/// Wrap an extension value in its Extension envelope.
pub fn encode_extension<T>(value: &T, critical: bool) -> Result<Extension>
where
    T: AssociatedOid + Encode,
{
    let der = value.to_der()?;
    Ok(Extension {
        extn_id: T::OID,
        critical,
        extn_value: OctetString::new(der)?,
    })
}

/// Find and decode an extension by type.
pub fn find_extension<T>(extensions: Option<&Extensions>) -> Result<Option<(bool, T)>>
where
    T: AssociatedOid + DecodeOwned,
{
    let Some(extensions) = extensions else {
        return Ok(None);
    };

    match extensions.iter().find(|ext| ext.extn_id == T::OID) {
        Some(ext) => {
            let value = T::from_der(ext.extn_value.as_bytes()).map_err(|e| {
                CertToolError::InputError(format!("Malformed extension {}: {}", T::OID, e))
            })?;
            Ok(Some((ext.critical, value)))
        }
        None => Ok(None),
    }
}

/// CRL distribution point and authority information access extensions.
///
/// Each list produces its extension only when it is non-empty.
pub fn distribution_point_extensions(points: &DistributionPoints) -> Result<Vec<Extension>> {
    let mut extensions = Vec::new();

    if !points.crl_uris.is_empty() {
        let mut dps = Vec::with_capacity(points.crl_uris.len());
        for uri in &points.crl_uris {
            dps.push(DistributionPoint {
                distribution_point: Some(DistributionPointName::FullName(vec![
                    GeneralName::UniformResourceIdentifier(ia5(uri)?),
                ])),
                reasons: None,
                crl_issuer: None,
            });
        }
        extensions.push(encode_extension(&CrlDistributionPoints(dps), false)?);
    }

    if !points.ca_issuer_uris.is_empty() {
        let mut access = Vec::with_capacity(points.ca_issuer_uris.len());
        for uri in &points.ca_issuer_uris {
            access.push(AccessDescription {
                access_method: ID_AD_CA_ISSUERS,
                access_location: GeneralName::UniformResourceIdentifier(ia5(uri)?),
            });
        }
        extensions.push(encode_extension(&AuthorityInfoAccessSyntax(access), false)?);
    }

    Ok(extensions)
}

/// Read the CRL distribution point and CA issuer URIs back out of a set of
/// extensions.
pub fn distribution_points_of(extensions: Option<&Extensions>) -> Result<DistributionPoints> {
    let mut points = DistributionPoints::default();

    if let Some((_, CrlDistributionPoints(dps))) =
        find_extension::<CrlDistributionPoints>(extensions)?
    {
        for dp in dps {
            if let Some(DistributionPointName::FullName(names)) = dp.distribution_point {
                points.crl_uris.extend(names.into_iter().filter_map(uri_of));
            }
        }
    }

    if let Some((_, AuthorityInfoAccessSyntax(access))) =
        find_extension::<AuthorityInfoAccessSyntax>(extensions)?
    {
        points.ca_issuer_uris.extend(
            access
                .into_iter()
                .filter(|a| a.access_method == ID_AD_CA_ISSUERS)
                .filter_map(|a| uri_of(a.access_location)),
        );
    }

    Ok(points)
}

fn uri_of(name: GeneralName) -> Option<String> {
    match name {
        GeneralName::UniformResourceIdentifier(uri) => Some(uri.to_string()),
        _ => None,
    }
}

/// ecdsa-with-SHA256, parameters absent.
pub fn ecdsa_sha256_algorithm() -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: ECDSA_WITH_SHA_256,
        parameters: None,
    }
}

/// Sign the DER encoding of a to-be-signed structure.
pub fn sign_tbs<T: Encode>(tbs: &T, keypair: &Keypair) -> Result<BitString> {
    let tbs_der = tbs
        .to_der()
        .map_err(|e| CertToolError::EncodingError(format!("Failed to encode TBS: {}", e)))?;

    let signature = keypair.sign(&tbs_der);

    BitString::from_bytes(signature.as_bytes()).map_err(|e| {
        CertToolError::EncodingError(format!("Failed to create signature bitstring: {}", e))
    })
}

/// Sign a to-be-signed certificate, producing the full certificate.
pub fn sign_certificate(tbs: TbsCertificate, signer: &Keypair) -> Result<Certificate> {
    let signature = sign_tbs(&tbs, signer)?;
    Ok(Certificate {
        signature_algorithm: tbs.signature.clone(),
        tbs_certificate: tbs,
        signature,
    })
}

/// Convert a Certificate to PEM format.
pub fn cert_to_pem(cert: &Certificate) -> Result<String> {
    let der = cert.to_der().map_err(|e| {
        CertToolError::EncodingError(format!("Failed to encode certificate: {}", e))
    })?;

    Ok(pem::encode(&pem::Pem::new(CERTIFICATE_LABEL, der)))
}

/// Render DER bytes in the requested output format.
pub fn encode_output(der: Vec<u8>, label: &str, format: OutputFormat) -> Vec<u8> {
    match format {
        OutputFormat::Der => der,
        OutputFormat::Pem => pem::encode(&pem::Pem::new(label, der)).into_bytes(),
    }
}
