//! The finished aggregate handed to the renderers.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::partner::PartnerEntry;

/// Every partner pair seen in a run, keyed by canonical key.
///
/// The partner map is ordered by key and each entry's mails are ordered by
/// `(date, time, mail_id)`, so the serialized report does not depend on the
/// order in which records were aggregated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    #[serde(rename = "createDateTime")]
    pub created_at: DateTime<FixedOffset>,
    #[serde(rename = "createDateTimeUnix")]
    pub created_at_unix: i64,
    /// `YYYY-MM-DD` of `created_at`.
    #[serde(rename = "createDate")]
    pub created_date: String,
    /// `HH:MM:SS` of `created_at`.
    #[serde(rename = "createTime")]
    pub created_time: String,
    pub partners: BTreeMap<String, PartnerEntry>,
}

impl AggregateReport {
    pub fn new(created_at: DateTime<FixedOffset>, partners: BTreeMap<String, PartnerEntry>) -> Self {
        Self {
            created_at_unix: created_at.timestamp(),
            created_date: created_at.format("%Y-%m-%d").to_string(),
            created_time: created_at.format("%H:%M:%S").to_string(),
            created_at,
            partners,
        }
    }

    pub fn partner_count(&self) -> usize {
        self.partners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partners.is_empty()
    }

    /// Number of mails across all partners.
    pub fn total_mails(&self) -> u64 {
        self.partners.values().map(|p| p.mails_total).sum()
    }

    /// Byte volume across all partners, sentinel sizes included.
    pub fn total_size(&self) -> i64 {
        self.partners.values().map(|p| p.size_total).sum()
    }

    /// Number of partner pairs per type tag (`i2e`, `e2e`, ...).
    pub fn count_by_type(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for p in self.partners.values() {
            *counts.entry(p.kind.clone()).or_default() += 1;
        }
        counts
    }

    /// The `n` pairs with the most mails, ties broken by key.
    pub fn top_partners(&self, n: usize) -> Vec<&PartnerEntry> {
        let mut sorted: Vec<&PartnerEntry> = self.partners.values().collect();
        sorted.sort_by(|a, b| b.mails_total.cmp(&a.mails_total));
        sorted.truncate(n);
        sorted
    }
}
