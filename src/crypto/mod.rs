//! Cryptographic operations module.
//!
//! - P-256 key generation, decoding and encoding
//! - ECDSA signing of to-be-signed structures
//! - Random serial numbers and random byte blocks
//!
//! # Example
//!
//! ```rust
//! use cert_tools::crypto::ecdsa::generate_p256_keypair;
//!
//! # fn example() -> cert_tools::error::Result<()> {
//! let keypair = generate_p256_keypair()?;
//! let signature = keypair.sign(b"message");
//! keypair.verify(b"message", &signature)?;
//! # Ok(())
//! # }
//! ```

pub mod ecdsa;
pub mod random;
