//! Certificate store scanning.
//!
//! Finds issued certificates in a directory by file-name prefix, email
//! address and subject text, and picks which of them to report for
//! revocation.

use crate::cert::loader::{certificate_from_bytes, read_input};
use crate::cert::record::CertificateRecord;
use crate::error::Result;
use crate::storage::index::{CertificateIndex, IndexEntry, LatestFilter};
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// What to look for in a certificate directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanQuery {
    pub directory: PathBuf,
    /// Only files whose name starts with this are read.
    pub prefix: String,
    /// Exact email to match; empty matches any.
    pub email: String,
    /// Case-sensitive subject substring; empty matches any.
    pub subject: String,
}

impl ScanQuery {
    /// The first certificate email accepted by this query, if any.
    ///
    /// The subject filter applies to the certificate as a whole, so a
    /// subject mismatch rejects every email.
    pub fn matching_email<'a>(&self, record: &'a CertificateRecord) -> Option<&'a str> {
        if !self.subject.is_empty() && !record.subject.contains(&self.subject) {
            return None;
        }
        record
            .emails()
            .iter()
            .find(|email| self.email.is_empty() || **email == self.email)
            .map(String::as_str)
    }
}

/// Line format of reported certificates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputStyle {
    /// `SERIAL,NOW`
    #[default]
    Short,
    /// `SERIAL,EMAIL,[ORGS],[OUS],CN,ISSUED`
    Extended,
}

/// File names in `directory` starting with `prefix`, sorted.
fn candidate_files(directory: &Path, prefix: &str) -> Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(directory)? {
        let entry = entry?;
        if !entry.path().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(prefix) {
            files.push((name, entry.path()));
        }
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

/// Scan a directory and index every matching certificate under the email
/// it matched on.
///
/// Any candidate file that is not a certificate fails the whole scan.
pub fn scan_directory(query: &ScanQuery) -> Result<CertificateIndex> {
    let mut index = CertificateIndex::new();

    for (name, path) in candidate_files(&query.directory, &query.prefix)? {
        let cert = certificate_from_bytes(&read_input(&path)?)?;
        let record = CertificateRecord::from_certificate(&cert)?;

        if let Some(email) = query.matching_email(&record) {
            debug!(
                file = %name,
                not_before = record.not_before.timestamp(),
                not_after = record.not_after.timestamp(),
                email = %email,
                "matched certificate"
            );
            let email = email.to_string();
            index.insert(IndexEntry::new(name, email, record));
        }
    }

    info!(
        directory = %query.directory.display(),
        matches = index.len(),
        "scanned certificate store"
    );
    Ok(index)
}

/// Scan, run latest-selection if the filter asks for it, and return the
/// reported entries' output lines.
///
/// # Example
///
/// ```rust,no_run
/// use cert_tools::storage::index::LatestFilter;
/// use cert_tools::storage::scanner::{find_certificates, OutputStyle, ScanQuery};
///
/// # fn example() -> cert_tools::error::Result<()> {
/// let query = ScanQuery {
///     directory: "issued".into(),
///     prefix: "user-".to_string(),
///     email: "alice@example.com".to_string(),
///     subject: String::new(),
/// };
/// let filter = LatestFilter { only_latest: false, except_latest: true };
/// for line in find_certificates(&query, filter, OutputStyle::Short)? {
///     println!("{}", line);
/// }
/// # Ok(())
/// # }
/// ```
pub fn find_certificates(
    query: &ScanQuery,
    filter: LatestFilter,
    style: OutputStyle,
) -> Result<Vec<String>> {
    let mut index = scan_directory(query)?;
    if filter.needs_latest() {
        index.mark_latest();
    }

    let now = Utc::now();
    Ok(index
        .select(filter)
        .into_iter()
        .map(|entry| format_entry(entry, style, now))
        .collect())
}

fn rfc3339(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Render one reported entry.
pub fn format_entry(entry: &IndexEntry, style: OutputStyle, now: DateTime<Utc>) -> String {
    let serial = entry.record.serial_hex();
    match style {
        OutputStyle::Short => format!("{},{}", serial, rfc3339(now)),
        OutputStyle::Extended => {
            let subject = &entry.record.subject;
            format!(
                "{},{},[{}],[{}],{},{}",
                serial,
                entry.email,
                subject.organization.as_slice().join(" "),
                subject.organizational_unit.as_slice().join(" "),
                subject.common_name,
                rfc3339(entry.issued)
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::builder::{cert_to_pem, sign_certificate};
    use crate::cert::ca::{create_ca_certificate, CaIntent};
    use crate::cert::leaf::{build_leaf_template_at, LeafIntent, UsageFlags};
    use crate::cert::request::{create_certificate_request, RequestIntent};
    use crate::cert::subject::{AttributeList, SubjectBuilder};
    use crate::config::DistributionPoints;
    use crate::crypto::ecdsa::{generate_p256_keypair, Keypair};
    use crate::error::CertToolError;
    use chrono::TimeZone;
    use tempfile::TempDir;
    use x509_cert::certificate::Certificate;

    struct Issuer {
        key: Keypair,
        cert: Certificate,
    }

    fn issuer() -> Issuer {
        let key = generate_p256_keypair().unwrap();
        let cert = create_ca_certificate(
            &CaIntent {
                subject: SubjectBuilder::new().common_name("Store CA").build(),
                hosts: vec![],
                emails: vec!["pki@example.com".to_string()],
                validity_days: 3650,
                distribution: DistributionPoints::default(),
            },
            &key,
        )
        .unwrap();
        Issuer { key, cert }
    }

    fn issue_at(ca: &Issuer, email: &str, ou: &str, serial: u128, day: u32) -> Certificate {
        let csr = create_certificate_request(
            &RequestIntent {
                subject: SubjectBuilder::new()
                    .organization(AttributeList::from_comma_separated("Example Ltd"))
                    .organizational_unit(AttributeList::from_comma_separated(ou))
                    .common_name("x")
                    .build(),
                hosts: vec![],
                emails: vec![email.to_string()],
            },
            &generate_p256_keypair().unwrap(),
        )
        .unwrap();
        let intent = LeafIntent {
            usage: UsageFlags {
                client: true,
                ..Default::default()
            },
            validity_days: 90,
            distribution: DistributionPoints::default(),
        };
        let at = Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap();
        let tbs = build_leaf_template_at(&csr, &ca.cert, &intent, serial, at).unwrap();
        sign_certificate(tbs, &ca.key).unwrap()
    }

    fn write(dir: &TempDir, name: &str, cert: &Certificate) {
        std::fs::write(dir.path().join(name), cert_to_pem(cert).unwrap()).unwrap();
    }

    fn query(dir: &TempDir, email: &str) -> ScanQuery {
        ScanQuery {
            directory: dir.path().to_path_buf(),
            prefix: "cert-".to_string(),
            email: email.to_string(),
            subject: String::new(),
        }
    }

    fn serials(lines: &[String]) -> Vec<String> {
        let mut serials: Vec<String> = lines
            .iter()
            .map(|l| l.split(',').next().unwrap().to_string())
            .collect();
        serials.sort();
        serials
    }

    fn three_issuances() -> TempDir {
        let ca = issuer();
        let dir = TempDir::new().unwrap();
        write(&dir, "cert-b.pem", &issue_at(&ca, "x@example.com", "Ops", 0x3, 3));
        write(&dir, "cert-a.pem", &issue_at(&ca, "x@example.com", "Ops", 0x1, 1));
        write(&dir, "cert-c.pem", &issue_at(&ca, "x@example.com", "Ops", 0x2, 2));
        write(&dir, "cert-d.pem", &issue_at(&ca, "y@example.com", "Dev", 0x9, 5));
        write(&dir, "other.pem", &issue_at(&ca, "x@example.com", "Ops", 0x7, 9));
        dir
    }

    #[test]
    fn test_only_latest() {
        let dir = three_issuances();
        let filter = LatestFilter {
            only_latest: true,
            except_latest: false,
        };
        let lines =
            find_certificates(&query(&dir, "x@example.com"), filter, OutputStyle::Short).unwrap();

        assert_eq!(serials(&lines), vec!["0000000000000003"]);
    }

    #[test]
    fn test_except_latest() {
        let dir = three_issuances();
        let filter = LatestFilter {
            only_latest: false,
            except_latest: true,
        };
        let lines =
            find_certificates(&query(&dir, "x@example.com"), filter, OutputStyle::Short).unwrap();

        assert_eq!(serials(&lines), vec!["0000000000000001", "0000000000000002"]);
    }

    #[test]
    fn test_default_reports_all_matches() {
        let dir = three_issuances();
        let lines = find_certificates(
            &query(&dir, ""),
            LatestFilter::default(),
            OutputStyle::Short,
        )
        .unwrap();

        assert_eq!(
            serials(&lines),
            vec![
                "0000000000000001",
                "0000000000000002",
                "0000000000000003",
                "0000000000000009"
            ]
        );
    }

    #[test]
    fn test_latest_per_email_group() {
        let dir = three_issuances();
        let filter = LatestFilter {
            only_latest: true,
            except_latest: false,
        };
        let lines = find_certificates(&query(&dir, ""), filter, OutputStyle::Short).unwrap();

        assert_eq!(serials(&lines), vec!["0000000000000003", "0000000000000009"]);
    }

    #[test]
    fn test_subject_filter() {
        let dir = three_issuances();
        let mut q = query(&dir, "");
        q.subject = "Dev".to_string();

        let index = scan_directory(&q).unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.group("y@example.com").is_some());
        assert!(index.group("x@example.com").is_none());
    }

    #[test]
    fn test_tie_goes_to_last_scanned() {
        let ca = issuer();
        let dir = TempDir::new().unwrap();
        write(&dir, "cert-1.pem", &issue_at(&ca, "t@example.com", "Ops", 0x10, 4));
        write(&dir, "cert-2.pem", &issue_at(&ca, "t@example.com", "Ops", 0x20, 4));

        let mut index = scan_directory(&query(&dir, "t@example.com")).unwrap();
        index.mark_latest();

        let group = index.group("t@example.com").unwrap();
        assert_eq!(group[0].file_name, "cert-1.pem");
        assert!(group[0].revoke);
        assert!(!group[1].revoke);
    }

    #[test]
    fn test_extended_line() {
        let dir = three_issuances();
        let mut index = scan_directory(&query(&dir, "y@example.com")).unwrap();
        index.mark_latest();
        let entry = &index.group("y@example.com").unwrap()[0];

        let line = format_entry(entry, OutputStyle::Extended, Utc::now());
        assert_eq!(
            line,
            "0000000000000009,y@example.com,[Example Ltd],[Dev],x,2024-01-05T00:00:00Z"
        );
    }

    #[test]
    fn test_short_line_uses_now() {
        let dir = three_issuances();
        let index = scan_directory(&query(&dir, "y@example.com")).unwrap();
        let entry = &index.group("y@example.com").unwrap()[0];

        let now = Utc.with_ymd_and_hms(2025, 6, 1, 8, 30, 0).unwrap();
        assert_eq!(
            format_entry(entry, OutputStyle::Short, now),
            "0000000000000009,2025-06-01T08:30:00Z"
        );
    }

    #[test]
    fn test_non_certificate_file_fails_scan() {
        let dir = three_issuances();
        std::fs::write(dir.path().join("cert-zz.pem"), "garbage").unwrap();

        assert!(matches!(
            scan_directory(&query(&dir, "")),
            Err(CertToolError::InputError(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_certificate_is_scanned() {
        let ca = issuer();
        let dir = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let cert_path = target.path().join("stored.pem");
        let cert = issue_at(&ca, "x@example.com", "Ops", 0x42, 7);
        std::fs::write(&cert_path, cert_to_pem(&cert).unwrap()).unwrap();
        std::os::unix::fs::symlink(&cert_path, dir.path().join("cert-1.pem")).unwrap();

        let index = scan_directory(&query(&dir, "x@example.com")).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.group("x@example.com").unwrap()[0].file_name, "cert-1.pem");
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let dir = TempDir::new().unwrap();
        let q = ScanQuery {
            directory: dir.path().join("missing"),
            ..Default::default()
        };
        assert!(matches!(scan_directory(&q), Err(CertToolError::Io(_))));
    }
}
