//! Loading keys, certificates and requests from files.
//!
//! Certificates are accepted as PEM (first `CERTIFICATE` block) or raw DER.
//! Keys and requests are read as PEM.

use crate::cert::builder::CERTIFICATE_LABEL;
use crate::cert::request::CertificateRequest;
use crate::crypto::ecdsa::Keypair;
use crate::error::{CertToolError, Result};
use der::Decode;
use std::path::Path;
use tracing::debug;
use x509_cert::certificate::Certificate;

/// Read a file, reporting a missing or unreadable file as an input error.
pub fn read_input(path: &Path) -> Result<Vec<u8>> {
    debug!(path = %path.display(), "reading input");
    std::fs::read(path).map_err(|e| {
        CertToolError::InputError(format!("Failed to read {}: {}", path.display(), e))
    })
}

fn read_text(path: &Path) -> Result<String> {
    let bytes = read_input(path)?;
    String::from_utf8(bytes)
        .map_err(|_| CertToolError::InputError(format!("{} is not PEM text", path.display())))
}

/// Decode a certificate from the first `CERTIFICATE` PEM block.
///
/// # Example
///
/// ```rust,no_run
/// use cert_tools::cert::loader::certificate_from_pem;
///
/// # fn example() -> cert_tools::error::Result<()> {
/// let pem = std::fs::read_to_string("ca.pem")?;
/// let cert = certificate_from_pem(&pem)?;
/// println!("{}", cert.tbs_certificate.subject);
/// # Ok(())
/// # }
/// ```
pub fn certificate_from_pem(pem_str: &str) -> Result<Certificate> {
    let blocks = pem::parse_many(pem_str)
        .map_err(|e| CertToolError::InputError(format!("Failed to read PEM: {}", e)))?;

    let block = blocks
        .iter()
        .find(|b| b.tag() == CERTIFICATE_LABEL)
        .ok_or_else(|| {
            CertToolError::InputError("PEM data does not contain a certificate".to_string())
        })?;

    certificate_from_der(block.contents())
}

/// Decode a DER certificate.
pub fn certificate_from_der(der: &[u8]) -> Result<Certificate> {
    Certificate::from_der(der)
        .map_err(|e| CertToolError::InputError(format!("Failed to parse certificate: {}", e)))
}

/// Decode a certificate that may be PEM or DER.
pub fn certificate_from_bytes(bytes: &[u8]) -> Result<Certificate> {
    if looks_like_pem(bytes) {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| CertToolError::InputError("PEM data is not valid text".to_string()))?;
        certificate_from_pem(text)
    } else {
        certificate_from_der(bytes)
    }
}

fn looks_like_pem(bytes: &[u8]) -> bool {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    bytes[start..].starts_with(b"-----BEGIN")
}

pub fn load_certificate(path: &Path) -> Result<Certificate> {
    certificate_from_bytes(&read_input(path)?)
}

/// Load a P-256 signing key from an `EC PRIVATE KEY` or `PRIVATE KEY` file.
pub fn load_keypair(path: &Path) -> Result<Keypair> {
    Keypair::from_pem(&read_text(path)?)
}

pub fn load_request(path: &Path) -> Result<CertificateRequest> {
    CertificateRequest::from_pem(&read_text(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::builder::cert_to_pem;
    use crate::cert::ca::{create_ca_certificate, CaIntent};
    use crate::cert::subject::SubjectBuilder;
    use crate::config::DistributionPoints;
    use crate::crypto::ecdsa::generate_p256_keypair;
    use der::Encode;
    use tempfile::TempDir;

    fn test_cert() -> Certificate {
        let keypair = generate_p256_keypair().unwrap();
        create_ca_certificate(
            &CaIntent {
                subject: SubjectBuilder::new().common_name("Loader CA").build(),
                hosts: vec![],
                emails: vec!["pki@example.com".to_string()],
                validity_days: 30,
                distribution: DistributionPoints::default(),
            },
            &keypair,
        )
        .unwrap()
    }

    #[test]
    fn test_certificate_from_pem() {
        let cert = test_cert();
        let pem = cert_to_pem(&cert).unwrap();

        let loaded = certificate_from_pem(&pem).unwrap();
        assert_eq!(loaded, cert);
    }

    #[test]
    fn test_certificate_from_pem_skips_other_blocks() {
        let cert = test_cert();
        let key_pem = generate_p256_keypair().unwrap().to_sec1_pem().unwrap();
        let combined = format!("{}{}", key_pem, cert_to_pem(&cert).unwrap());

        assert_eq!(certificate_from_pem(&combined).unwrap(), cert);
    }

    #[test]
    fn test_certificate_from_invalid_pem() {
        assert!(matches!(
            certificate_from_pem("not a valid pem"),
            Err(CertToolError::InputError(_))
        ));
    }

    #[test]
    fn test_certificate_from_bytes_accepts_der() {
        let cert = test_cert();
        let der = cert.to_der().unwrap();

        assert_eq!(certificate_from_bytes(&der).unwrap(), cert);
    }

    #[test]
    fn test_load_files() {
        let temp_dir = TempDir::new().unwrap();
        let keypair = generate_p256_keypair().unwrap();
        let key_path = temp_dir.path().join("ca.key");
        std::fs::write(&key_path, keypair.to_sec1_pem().unwrap()).unwrap();

        let loaded = load_keypair(&key_path).unwrap();
        assert_eq!(loaded.public, keypair.public);

        let cert_path = temp_dir.path().join("ca.pem");
        std::fs::write(&cert_path, cert_to_pem(&test_cert()).unwrap()).unwrap();
        assert!(load_certificate(&cert_path).is_ok());
    }

    #[test]
    fn test_missing_file_is_input_error() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope.pem");

        assert!(matches!(
            load_certificate(&missing),
            Err(CertToolError::InputError(_))
        ));
        assert!(matches!(
            load_keypair(&missing),
            Err(CertToolError::InputError(_))
        ));
    }
}
