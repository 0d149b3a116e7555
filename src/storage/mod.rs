//! Certificate store module.
//!
//! Scans a directory of issued certificates and indexes them by email
//! address so superseded certificates can be picked out for revocation.

pub mod index;
pub mod scanner;
