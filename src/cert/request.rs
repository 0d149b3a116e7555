//! Certificate signing requests (PKCS#10).
//!
//! Requests are created by the key holder and later consumed by the leaf
//! issuer, which verifies the self-signature before trusting any field.

use crate::cert::builder::{
    ecdsa_sha256_algorithm, encode_extension, find_extension, sign_tbs, SubjectAltNames,
};
use crate::cert::subject::Subject;
use crate::crypto::ecdsa::Keypair;
use crate::error::{CertToolError, Result};
use const_oid::db::rfc5912::{ECDSA_WITH_SHA_256, ECDSA_WITH_SHA_384, ECDSA_WITH_SHA_512};
use const_oid::ObjectIdentifier;
use der::asn1::{Any, SetOfVec};
use der::{Decode, Encode};
use p256::ecdsa::signature::hazmat::PrehashVerifier;
use p256::ecdsa::{Signature, VerifyingKey};
use p256::pkcs8::DecodePublicKey;
use sha2::{Digest, Sha256, Sha384, Sha512};
use spki::SubjectPublicKeyInfoOwned;
use tracing::debug;
use x509_cert::attr::Attribute;
use x509_cert::ext::pkix::SubjectAltName;
use x509_cert::ext::Extension;
use x509_cert::name::Name;
use x509_cert::request::{CertReq, CertReqInfo, Version};

/// PEM label of a PKCS#10 request.
pub const CERTIFICATE_REQUEST_LABEL: &str = "CERTIFICATE REQUEST";

/// Label written by some older tools.
const LEGACY_REQUEST_LABEL: &str = "NEW CERTIFICATE REQUEST";

/// PKCS#9 extensionRequest attribute.
pub const EXTENSION_REQUEST_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.14");

/// What goes into a certificate signing request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestIntent {
    pub subject: Subject,
    /// DNS names or IP literals.
    pub hosts: Vec<String>,
    pub emails: Vec<String>,
}

/// A decoded certificate signing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    inner: CertReq,
}

impl CertificateRequest {
    /// Parse a `CERTIFICATE REQUEST` PEM block.
    pub fn from_pem(pem_str: &str) -> Result<Self> {
        let pem = pem::parse(pem_str)
            .map_err(|e| CertToolError::InputError(format!("Failed to parse PEM request: {}", e)))?;

        if pem.tag() != CERTIFICATE_REQUEST_LABEL && pem.tag() != LEGACY_REQUEST_LABEL {
            return Err(CertToolError::InputError(format!(
                "Expected {} PEM tag, got {}",
                CERTIFICATE_REQUEST_LABEL,
                pem.tag()
            )));
        }

        Self::from_der(pem.contents())
    }

    /// Parse a DER encoded request.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let inner = CertReq::from_der(der)
            .map_err(|e| CertToolError::InputError(format!("Malformed certificate request: {}", e)))?;
        Ok(Self { inner })
    }

    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(self.inner.to_der()?)
    }

    pub fn to_pem(&self) -> Result<String> {
        Ok(pem::encode(&pem::Pem::new(
            CERTIFICATE_REQUEST_LABEL,
            self.to_der()?,
        )))
    }

    pub fn name(&self) -> &Name {
        &self.inner.info.subject
    }

    pub fn subject(&self) -> Subject {
        Subject::from_name(&self.inner.info.subject)
    }

    pub fn public_key_info(&self) -> &SubjectPublicKeyInfoOwned {
        &self.inner.info.public_key
    }

    /// Extensions carried in the extensionRequest attribute, if any.
    pub fn requested_extensions(&self) -> Result<Vec<Extension>> {
        let mut extensions = Vec::new();
        for attr in self.inner.info.attributes.iter() {
            if attr.oid != EXTENSION_REQUEST_OID {
                continue;
            }
            for value in attr.values.iter() {
                let der = value.to_der()?;
                let requested = Vec::<Extension>::from_der(&der).map_err(|e| {
                    CertToolError::InputError(format!("Malformed extensionRequest: {}", e))
                })?;
                extensions.extend(requested);
            }
        }
        Ok(extensions)
    }

    /// DNS, IP and email names requested through the SAN extension.
    pub fn subject_alt_names(&self) -> Result<SubjectAltNames> {
        let extensions = self.requested_extensions()?;
        match find_extension::<SubjectAltName>(Some(&extensions))? {
            Some((_, SubjectAltName(names))) => Ok(SubjectAltNames::from_general_names(&names)),
            None => Ok(SubjectAltNames::default()),
        }
    }

    /// Check the request's self-signature against its own public key.
    ///
    /// Accepts ecdsa-with-SHA256/384/512 over a P-256 key.
    pub fn verify(&self) -> Result<()> {
        let spki_der = self.inner.info.public_key.to_der()?;
        let key = VerifyingKey::from_public_key_der(&spki_der).map_err(|e| {
            CertToolError::KeyFormatError(format!("Request key is not a P-256 key: {}", e))
        })?;

        let info_der = self.inner.info.to_der()?;
        let digest = match self.inner.algorithm.oid {
            oid if oid == ECDSA_WITH_SHA_256 => Sha256::digest(&info_der).to_vec(),
            oid if oid == ECDSA_WITH_SHA_384 => Sha384::digest(&info_der).to_vec(),
            oid if oid == ECDSA_WITH_SHA_512 => Sha512::digest(&info_der).to_vec(),
            other => {
                return Err(CertToolError::SignatureError(format!(
                    "Unsupported request signature algorithm {}",
                    other
                )))
            }
        };

        let signature_bytes = self.inner.signature.as_bytes().ok_or_else(|| {
            CertToolError::SignatureError("Request signature has unused bits".to_string())
        })?;
        let signature = Signature::from_der(signature_bytes).map_err(|e| {
            CertToolError::SignatureError(format!("Malformed request signature: {}", e))
        })?;

        key.verify_prehash(&digest, &signature).map_err(|e| {
            CertToolError::SignatureError(format!("Request signature does not verify: {}", e))
        })?;

        debug!(subject = %self.inner.info.subject, "request signature verified");
        Ok(())
    }

    pub fn as_inner(&self) -> &CertReq {
        &self.inner
    }
}

impl From<CertReq> for CertificateRequest {
    fn from(inner: CertReq) -> Self {
        Self { inner }
    }
}

/// Build and self-sign a certificate signing request.
///
/// Hosts and emails become a subjectAltName extension inside the
/// extensionRequest attribute; the subject itself never carries the emails.
///
/// # Example
///
/// ```
/// use cert_tools::cert::request::{create_certificate_request, RequestIntent};
/// use cert_tools::cert::subject::SubjectBuilder;
/// use cert_tools::crypto::ecdsa::generate_p256_keypair;
///
/// # fn example() -> cert_tools::error::Result<()> {
/// let keypair = generate_p256_keypair()?;
/// let intent = RequestIntent {
///     subject: SubjectBuilder::new().common_name("alice").build(),
///     hosts: vec![],
///     emails: vec!["alice@example.com".to_string()],
/// };
/// let request = create_certificate_request(&intent, &keypair)?;
/// request.verify()?;
/// # Ok(())
/// # }
/// ```
pub fn create_certificate_request(
    intent: &RequestIntent,
    keypair: &Keypair,
) -> Result<CertificateRequest> {
    let sans = SubjectAltNames::from_hosts(&intent.hosts, &intent.emails);

    let mut attributes = SetOfVec::new();
    if !sans.is_empty() {
        let extensions = vec![encode_extension(
            &SubjectAltName(sans.to_general_names()?),
            false,
        )?];
        let value = Any::from_der(&extensions.to_der()?)?;

        let mut values = SetOfVec::new();
        values.insert_ordered(value).map_err(|e| {
            CertToolError::EncodingError(format!("Failed to build extensionRequest: {}", e))
        })?;
        attributes
            .insert_ordered(Attribute {
                oid: EXTENSION_REQUEST_OID,
                values,
            })
            .map_err(|e| {
                CertToolError::EncodingError(format!("Failed to add request attribute: {}", e))
            })?;
    }

    let info = CertReqInfo {
        version: Version::V1,
        subject: intent.subject.to_name()?,
        public_key: keypair.public_key_info()?,
        attributes,
    };

    let signature = sign_tbs(&info, keypair)?;
    Ok(CertificateRequest::from(CertReq {
        info,
        algorithm: ecdsa_sha256_algorithm(),
        signature,
    }))
}
