//! Issuance defaults and output options.
//!
//! All configuration arrives through command-line flags; this module only
//! holds the defaults and the small value types the CLI hands to the
//! certificate builders.

use crate::error::{CertToolError, Result};
use std::str::FromStr;

/// Default certificate validity, in days.
pub const DEFAULT_VALIDITY_DAYS: u32 = 90;

/// Fixed CRL window: nextUpdate is always thisUpdate plus this many days.
pub const CRL_VALIDITY_DAYS: u32 = 100;

/// Encoding used when an artifact is written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Text-armored PEM block
    #[default]
    Pem,
    /// Raw DER bytes
    Der,
}

impl OutputFormat {
    /// Pick the format from a "binary output" switch.
    pub fn from_binary_flag(binary: bool) -> Self {
        if binary {
            OutputFormat::Der
        } else {
            OutputFormat::Pem
        }
    }
}

impl FromStr for OutputFormat {
    type Err = CertToolError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pem" => Ok(OutputFormat::Pem),
            "der" => Ok(OutputFormat::Der),
            other => Err(CertToolError::ParseError(format!(
                "Unsupported output format: '{}'. Use 'pem' or 'der'",
                other
            ))),
        }
    }
}

/// CRL distribution point and CA issuer URIs placed in a certificate.
///
/// Empty lists mean "none given": a CA template then carries no such
/// extension, and a leaf template inherits its issuer's lists instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistributionPoints {
    pub crl_uris: Vec<String>,
    pub ca_issuer_uris: Vec<String>,
}

impl DistributionPoints {
    pub fn new(crl_uris: Vec<String>, ca_issuer_uris: Vec<String>) -> Self {
        Self {
            crl_uris,
            ca_issuer_uris,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("PEM".parse::<OutputFormat>().unwrap(), OutputFormat::Pem);
        assert_eq!("der".parse::<OutputFormat>().unwrap(), OutputFormat::Der);
        assert!(matches!(
            "hex".parse::<OutputFormat>(),
            Err(CertToolError::ParseError(_))
        ));
    }

    #[test]
    fn test_output_format_from_binary_flag() {
        assert_eq!(OutputFormat::from_binary_flag(true), OutputFormat::Der);
        assert_eq!(OutputFormat::from_binary_flag(false), OutputFormat::Pem);
        assert_eq!(OutputFormat::default(), OutputFormat::Pem);
    }

    #[test]
    fn test_distribution_points_default_is_empty() {
        let points = DistributionPoints::default();
        assert!(points.crl_uris.is_empty());
        assert!(points.ca_issuer_uris.is_empty());
    }
}
