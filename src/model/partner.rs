//! Per-pair traffic statistics and the canonical, direction-independent pair key.

use serde::{Deserialize, Serialize};

use super::address::{split_address, HostClassifier, HostType};
use super::record::MailRecord;

/// Order an address pair so that both directions of a conversation agree.
///
/// - Same host: the lexically smaller address comes first.
/// - Different hosts: the address with the lexically smaller host comes first.
///
/// The result is the same for `(a, b)` and `(b, a)`.
pub fn canonical_pair<'a>(from: &'a str, to: &'a str) -> (&'a str, &'a str) {
    let (_, host_from) = split_address(from);
    let (_, host_to) = split_address(to);

    let swap = if host_from == host_to {
        from > to
    } else {
        host_from > host_to
    };

    if swap {
        (to, from)
    } else {
        (from, to)
    }
}

/// The map key of the [`PartnerEntry`] a record belongs to: `"partnerA partnerB"`.
pub fn canonical_key(record: &MailRecord) -> String {
    let (a, b) = canonical_pair(&record.from, &record.to);
    format!("{a} {b}")
}

/// All mails exchanged between two addresses, with directional counters.
///
/// Invariant: `mails_total == mails_a_to_b + mails_b_to_a` and
/// `size_total == size_a_to_b + size_b_to_a`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerEntry {
    pub partner_a: String,
    pub user_a: String,
    pub host_a: String,
    pub type_a: HostType,
    pub partner_b: String,
    pub user_b: String,
    pub host_b: String,
    pub type_b: HostType,
    /// Combined tag such as `i2e`.
    #[serde(rename = "type")]
    pub kind: String,
    pub mails_total: u64,
    pub size_total: i64,
    #[serde(rename = "mailsAtoB")]
    pub mails_a_to_b: u64,
    #[serde(rename = "sizeAtoB")]
    pub size_a_to_b: i64,
    #[serde(rename = "mailsBtoA")]
    pub mails_b_to_a: u64,
    #[serde(rename = "sizeBtoA")]
    pub size_b_to_a: i64,
    pub mails: Vec<MailRecord>,
}

impl PartnerEntry {
    /// Create an empty entry for an already canonically ordered pair.
    pub fn new(partner_a: &str, partner_b: &str, classifier: &HostClassifier) -> Self {
        let (user_a, host_a) = split_address(partner_a);
        let (user_b, host_b) = split_address(partner_b);
        let type_a = classifier.classify(host_a);
        let type_b = classifier.classify(host_b);

        Self {
            partner_a: partner_a.to_string(),
            user_a: user_a.to_string(),
            host_a: host_a.to_string(),
            type_a,
            partner_b: partner_b.to_string(),
            user_b: user_b.to_string(),
            host_b: host_b.to_string(),
            type_b,
            kind: format!("{}2{}", type_a.initial(), type_b.initial()),
            mails_total: 0,
            size_total: 0,
            mails_a_to_b: 0,
            size_a_to_b: 0,
            mails_b_to_a: 0,
            size_b_to_a: 0,
            mails: Vec::new(),
        }
    }

    /// Create the entry a record belongs to, ordered per [`canonical_pair`].
    pub fn for_record(record: &MailRecord, classifier: &HostClassifier) -> Self {
        let (a, b) = canonical_pair(&record.from, &record.to);
        Self::new(a, b, classifier)
    }

    /// Whether `record` was sent by partner A.
    pub fn is_from_a(&self, record: &MailRecord) -> bool {
        self.partner_a == record.from
    }

    /// Fold a record into the counters and keep it.
    ///
    /// The record size is added as-is, so an unknown size
    /// ([`UNKNOWN_SIZE`](super::record::UNKNOWN_SIZE)) lowers both the total
    /// and the directional volume by one.
    pub fn add(&mut self, record: MailRecord) {
        self.mails_total += 1;
        self.size_total += record.size;
        if self.is_from_a(&record) {
            self.mails_a_to_b += 1;
            self.size_a_to_b += record.size;
        } else {
            self.mails_b_to_a += 1;
            self.size_b_to_a += record.size;
        }
        self.mails.push(record);
    }

    /// The map key of this entry.
    pub fn key(&self) -> String {
        format!("{} {}", self.partner_a, self.partner_b)
    }
}
