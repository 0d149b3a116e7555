//! In-memory index of scanned certificates, grouped by email address.
//!
//! The index is rebuilt on every scan and never persisted.

use crate::cert::record::CertificateRecord;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::debug;

/// A certificate that matched a scan, under one of its email addresses.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    /// File the certificate was read from.
    pub file_name: String,
    pub email: String,
    pub record: CertificateRecord,
    /// NotBefore of the certificate.
    pub issued: DateTime<Utc>,
    /// Cleared on the latest certificate of a group once latest-selection
    /// has run; every other entry stays eligible for revocation.
    pub revoke: bool,
}

impl IndexEntry {
    pub fn new(file_name: impl Into<String>, email: impl Into<String>, record: CertificateRecord) -> Self {
        Self {
            file_name: file_name.into(),
            email: email.into(),
            issued: record.not_before,
            record,
            revoke: true,
        }
    }
}

/// Which entries a query reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LatestFilter {
    /// Report only the latest certificate of each email.
    pub only_latest: bool,
    /// Report everything except the latest certificate of each email.
    pub except_latest: bool,
}

impl LatestFilter {
    /// Whether the latest entry per group has to be determined at all.
    pub fn needs_latest(&self) -> bool {
        self.only_latest || self.except_latest
    }

    /// Whether an entry with the given revoke flag is reported.
    pub fn emits(&self, revoke: bool) -> bool {
        (self.only_latest && !revoke)
            || (self.except_latest && revoke)
            || (!self.only_latest && !self.except_latest && revoke)
    }
}

/// Email address → matches, in scan order.
#[derive(Debug, Clone, Default)]
pub struct CertificateIndex {
    groups: BTreeMap<String, Vec<IndexEntry>>,
}

impl CertificateIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: IndexEntry) {
        self.groups.entry(entry.email.clone()).or_default().push(entry);
    }

    /// Number of entries across all groups.
    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn group(&self, email: &str) -> Option<&[IndexEntry]> {
        self.groups.get(email).map(Vec::as_slice)
    }

    /// Clear the revoke flag on the most recently issued entry of each
    /// group. On identical issue times the entry scanned last wins.
    pub fn mark_latest(&mut self) {
        for (email, entries) in self.groups.iter_mut() {
            let mut latest: Option<usize> = None;
            for (i, entry) in entries.iter().enumerate() {
                let newer = match latest {
                    Some(current) => entry.issued >= entries[current].issued,
                    None => true,
                };
                if newer {
                    latest = Some(i);
                }
            }

            if let Some(i) = latest {
                debug!(
                    email = %email,
                    serial = %entries[i].record.serial_hex(),
                    issued = %entries[i].issued.to_rfc3339(),
                    "latest certificate"
                );
                entries[i].revoke = false;
            }
        }
    }

    /// Entries the filter reports, grouped by email in sorted order and
    /// scan order within a group.
    pub fn select(&self, filter: LatestFilter) -> Vec<&IndexEntry> {
        self.groups
            .values()
            .flat_map(|entries| entries.iter())
            .filter(|entry| filter.emits(entry.revoke))
            .collect()
    }
}
