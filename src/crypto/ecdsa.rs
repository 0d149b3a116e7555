//! P-256 ECDSA key operations.
//!
//! This module provides generation, decoding and encoding of the elliptic
//! curve keys used to sign certificates, requests and revocation lists.

use crate::error::{CertToolError, Result};
use der::Decode;
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{DerSignature, SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePrivateKey, EncodePublicKey};
use rand::rngs::OsRng;
use spki::SubjectPublicKeyInfoOwned;

/// PEM label of a SEC1 encoded EC private key.
pub const EC_PRIVATE_KEY_LABEL: &str = "EC PRIVATE KEY";

/// PEM label of a PKCS#8 encoded private key.
pub const PKCS8_PRIVATE_KEY_LABEL: &str = "PRIVATE KEY";

/// A P-256 keypair consisting of a signing key and its verifying key.
#[derive(Debug, Clone)]
pub struct Keypair {
    pub secret: SigningKey,
    pub public: VerifyingKey,
}

impl Keypair {
    /// Create a new keypair from a signing key.
    pub fn from_secret(secret: SigningKey) -> Self {
        let public = secret.verifying_key().clone();
        Self { secret, public }
    }

    /// Decode a keypair from an `EC PRIVATE KEY` or `PRIVATE KEY` PEM block.
    ///
    /// # Example
    ///
    /// ```
    /// use cert_tools::crypto::ecdsa::{generate_p256_keypair, Keypair};
    ///
    /// let keypair = generate_p256_keypair().unwrap();
    /// let pem = keypair.to_sec1_pem().unwrap();
    /// let loaded = Keypair::from_pem(&pem).unwrap();
    /// assert_eq!(keypair.public, loaded.public);
    /// ```
    pub fn from_pem(pem_str: &str) -> Result<Self> {
        let pem = pem::parse(pem_str)
            .map_err(|e| CertToolError::InputError(format!("Failed to parse PEM key: {}", e)))?;

        match pem.tag() {
            EC_PRIVATE_KEY_LABEL => Self::from_sec1_der(pem.contents()),
            PKCS8_PRIVATE_KEY_LABEL => Self::from_pkcs8_der(pem.contents()),
            other => Err(CertToolError::InputError(format!(
                "Expected {} or {}, got {}",
                EC_PRIVATE_KEY_LABEL, PKCS8_PRIVATE_KEY_LABEL, other
            ))),
        }
    }

    /// Decode a keypair from SEC1 DER (the `EC PRIVATE KEY` payload).
    pub fn from_sec1_der(der: &[u8]) -> Result<Self> {
        let secret_key = p256::SecretKey::from_sec1_der(der).map_err(|e| {
            CertToolError::KeyFormatError(format!("Not a P-256 EC private key: {}", e))
        })?;
        Ok(Self::from_secret(SigningKey::from(&secret_key)))
    }

    /// Decode a keypair from PKCS#8 DER.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self> {
        let secret_key = p256::SecretKey::from_pkcs8_der(der).map_err(|e| {
            CertToolError::KeyFormatError(format!("Not a P-256 PKCS#8 private key: {}", e))
        })?;
        Ok(Self::from_secret(SigningKey::from(&secret_key)))
    }

    /// Encode the private key as SEC1 DER.
    pub fn to_sec1_der(&self) -> Result<Vec<u8>> {
        let secret_key = p256::SecretKey::from_bytes(&self.secret.to_bytes())
            .map_err(|e| CertToolError::KeyFormatError(format!("Invalid secret scalar: {}", e)))?;
        let der = secret_key
            .to_sec1_der()
            .map_err(|e| CertToolError::EncodingError(format!("Failed to encode key: {}", e)))?;
        Ok(der.to_vec())
    }

    /// Encode the private key as an `EC PRIVATE KEY` PEM block.
    pub fn to_sec1_pem(&self) -> Result<String> {
        let der = self.to_sec1_der()?;
        Ok(pem::encode(&pem::Pem::new(EC_PRIVATE_KEY_LABEL, der)))
    }

    /// DER encoding of the public key as a SubjectPublicKeyInfo.
    pub fn public_key_der(&self) -> Result<Vec<u8>> {
        let document = self.public.to_public_key_der().map_err(|e| {
            CertToolError::EncodingError(format!("Failed to encode public key: {}", e))
        })?;
        Ok(document.as_bytes().to_vec())
    }

    /// The public key as a SubjectPublicKeyInfo structure.
    pub fn public_key_info(&self) -> Result<SubjectPublicKeyInfoOwned> {
        let der = self.public_key_der()?;
        Ok(SubjectPublicKeyInfoOwned::from_der(&der)?)
    }

    /// Sign a message with ECDSA over SHA-256, returning a DER signature.
    pub fn sign(&self, message: &[u8]) -> DerSignature {
        self.secret.sign(message)
    }

    /// Verify a DER signature produced by [`Keypair::sign`].
    pub fn verify(&self, message: &[u8], signature: &DerSignature) -> Result<()> {
        self.public.verify(message, signature).map_err(|e| {
            CertToolError::SignatureError(format!("Signature verification failed: {}", e))
        })
    }
}

/// Generate a new P-256 keypair from the operating system RNG.
///
/// # Example
///
/// ```
/// use cert_tools::crypto::ecdsa::generate_p256_keypair;
///
/// let keypair = generate_p256_keypair().unwrap();
/// assert!(keypair.to_sec1_pem().unwrap().contains("BEGIN EC PRIVATE KEY"));
/// ```
pub fn generate_p256_keypair() -> Result<Keypair> {
    let secret = SigningKey::random(&mut OsRng);
    Ok(Keypair::from_secret(secret))
}
