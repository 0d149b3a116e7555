//! cert-tools: a small P-256 certificate authority toolkit
//!
//! This library builds and signs the artifacts a two-level PKI needs:
//!
//! - Generate P-256 signing keys and random byte blocks
//! - Create self-signed root CA certificates
//! - Create and verify certificate signing requests
//! - Issue server, client, code-signing, subordinate CA and CRL issuer
//!   certificates from verified requests
//! - Build certificate revocation lists from a revocation file
//! - Scan a certificate store to find superseded certificates per identity
//!
//! # Architecture
//!
//! Every operation is a linear pipeline: load inputs, build a template,
//! sign it, encode it. All operations return `Result` and nothing is written
//! until the artifact is complete.
//!
//! # Example
//!
//! ```rust
//! use cert_tools::cert::ca::{create_ca_certificate, CaIntent};
//! use cert_tools::cert::subject::SubjectBuilder;
//! use cert_tools::config::DistributionPoints;
//! use cert_tools::crypto::ecdsa::generate_p256_keypair;
//! use cert_tools::error::Result;
//!
//! fn example() -> Result<()> {
//!     let keypair = generate_p256_keypair()?;
//!     let intent = CaIntent {
//!         subject: SubjectBuilder::new().common_name("Example Root CA").build(),
//!         hosts: vec![],
//!         emails: vec!["pki@example.com".to_string()],
//!         validity_days: 3650,
//!         distribution: DistributionPoints::default(),
//!     };
//!     let ca = create_ca_certificate(&intent, &keypair)?;
//!     println!("Issued {}", ca.tbs_certificate.subject);
//!     Ok(())
//! }
//! # example().unwrap();
//! ```

pub mod cert;
pub mod config;
pub mod crypto;
pub mod error;
pub mod storage;

// Re-export commonly used types
pub use error::{CertToolError, Result};
