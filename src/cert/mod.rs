//! Certificate generation module.
//!
//! This module builds, signs and decodes the X.509 artifacts of a small
//! two-level CA: self-signed roots, signing requests, leaf certificates and
//! revocation lists.

pub mod builder;
pub mod ca;
pub mod crl;
pub mod leaf;
pub mod loader;
pub mod record;
pub mod request;
pub mod subject;
