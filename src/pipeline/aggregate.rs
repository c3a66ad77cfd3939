//! Single-threaded folding of mail records into partner statistics.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, FixedOffset};
use tracing::debug;

use crate::model::address::HostClassifier;
use crate::model::partner::{canonical_key, PartnerEntry};
use crate::model::record::MailRecord;
use crate::model::report::AggregateReport;
use crate::queue::RecordBatchQueue;

/// Owns the partner map for one run.
///
/// Only ever touched from one thread, after the worker pool has finished,
/// so the map needs no locking.
#[derive(Debug, Default)]
pub struct PartnerAggregator {
    classifier: HostClassifier,
    partners: HashMap<String, PartnerEntry>,
    folded: u64,
}

impl PartnerAggregator {
    pub fn new(classifier: HostClassifier) -> Self {
        Self {
            classifier,
            partners: HashMap::new(),
            folded: 0,
        }
    }

    /// Add one record to the entry of its canonical pair, creating it on first use.
    pub fn fold(&mut self, record: MailRecord) {
        let key = canonical_key(&record);
        let classifier = &self.classifier;
        self.partners
            .entry(key)
            .or_insert_with(|| PartnerEntry::for_record(&record, classifier))
            .add(record);
        self.folded += 1;
    }

    /// Take every record off `queue` in one lock and fold it. Returns how many were folded.
    pub fn drain(&mut self, queue: &RecordBatchQueue) -> usize {
        let records = queue.drain_all();
        let count = records.len();
        for record in records {
            self.fold(record);
        }
        debug!(count, partners = self.partners.len(), "Drained record queue");
        count
    }

    /// Records folded so far.
    pub fn folded(&self) -> u64 {
        self.folded
    }

    /// Number of distinct partner pairs.
    pub fn len(&self) -> usize {
        self.partners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partners.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&PartnerEntry> {
        self.partners.get(key)
    }

    /// Freeze the aggregate into a report with deterministic ordering.
    pub fn finish(self, created_at: DateTime<FixedOffset>) -> AggregateReport {
        let partners: BTreeMap<String, PartnerEntry> = self
            .partners
            .into_iter()
            .map(|(key, mut entry)| {
                entry.mails.sort_by(|a, b| {
                    (&a.date, &a.time, &a.mail_id, &a.subject, a.size)
                        .cmp(&(&b.date, &b.time, &b.mail_id, &b.subject, b.size))
                });
                (key, entry)
            })
            .collect();
        AggregateReport::new(created_at, partners)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::address::HostMatch;
    use crate::model::record::{MailParts, UNKNOWN_SIZE};

    fn classifier() -> HostClassifier {
        HostClassifier::new(["example.com"], HostMatch::Exact)
    }

    fn record(queue: &str, time: &str, from: &str, to: &str, size: i64) -> MailRecord {
        MailRecord::build(
            MailParts {
                queue_id: queue.into(),
                date: "2024-01-02".into(),
                time: time.into(),
                from: from.into(),
                to: to.into(),
                size,
                subject: format!("subject {queue}"),
            },
            &classifier(),
        )
    }

    fn created() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-06-01T12:00:00+00:00").unwrap()
    }

    fn sample() -> Vec<MailRecord> {
        vec![
            record("Q1", "03:04:05", "a@example.com", "b@example.org", 120),
            record("Q2", "03:05:00", "b@example.org", "a@example.com", 80),
            record("Q3", "04:00:00", "c@example.com", "a@example.com", 10),
            record("Q4", "04:00:01", "a@example.com", "c@example.com", UNKNOWN_SIZE),
            record("Q5", "05:00:00", "x@other.net", "b@example.org", 3),
            record("Q6", "05:00:00", "b@example.org", "x@other.net", 4),
            record("Q7", "06:00:00", "a@example.com", "b@example.org", 1),
        ]
    }

    #[test]
    fn test_both_directions_share_one_entry() {
        let mut agg = PartnerAggregator::new(classifier());
        agg.fold(record("Q1", "03:04:05", "a@example.com", "b@example.org", 120));
        agg.fold(record("Q2", "03:04:06", "b@example.org", "a@example.com", 80));

        assert_eq!(agg.len(), 1);
        let e = agg.get("a@example.com b@example.org").unwrap();
        assert_eq!(e.mails_total, 2);
        assert_eq!(e.size_total, 200);
        assert_eq!(e.mails_a_to_b, 1);
        assert_eq!(e.mails_b_to_a, 1);
        assert_eq!(e.kind, "i2e");
    }

    #[test]
    fn test_drain_empties_the_queue() {
        let queue = RecordBatchQueue::new();
        queue.push_slice(sample());
        let mut agg = PartnerAggregator::new(classifier());
        assert_eq!(agg.drain(&queue), 7);
        assert!(queue.is_empty());
        assert_eq!(agg.folded(), 7);
        assert_eq!(agg.len(), 3);
    }

    #[test]
    fn test_report_is_independent_of_fold_order() {
        let render = |records: Vec<MailRecord>| {
            let mut agg = PartnerAggregator::new(classifier());
            for r in records {
                agg.fold(r);
            }
            serde_json::to_string(&agg.finish(created())).unwrap()
        };

        let forward = render(sample());
        let mut reversed = sample();
        reversed.reverse();
        assert_eq!(forward, render(reversed));

        // A handful of rotations and interleavings.
        for shift in 1..7 {
            let mut rotated = sample();
            rotated.rotate_left(shift);
            assert_eq!(forward, render(rotated), "rotation {shift}");
        }
        let s = sample();
        let interleaved: Vec<MailRecord> = s
            .iter()
            .step_by(2)
            .chain(s.iter().skip(1).step_by(2))
            .cloned()
            .collect();
        assert_eq!(forward, render(interleaved));
    }

    #[test]
    fn test_finish_sorts_mails_chronologically() {
        let mut agg = PartnerAggregator::new(classifier());
        for r in sample().into_iter().rev() {
            agg.fold(r);
        }
        let report = agg.finish(created());
        let e = &report.partners["a@example.com b@example.org"];
        let times: Vec<&str> = e.mails.iter().map(|m| m.time.as_str()).collect();
        assert_eq!(times, ["03:04:05", "03:05:00", "06:00:00"]);
    }

    #[test]
    fn test_sentinel_size_in_totals() {
        let mut agg = PartnerAggregator::new(classifier());
        for r in sample() {
            agg.fold(r);
        }
        let report = agg.finish(created());
        let e = &report.partners["a@example.com c@example.com"];
        assert_eq!(e.mails_total, 2);
        assert_eq!(e.size_total, 9);
        assert_eq!(e.mails_b_to_a, 1);
        assert_eq!(e.size_b_to_a, 10);
        assert_eq!(e.size_a_to_b, UNKNOWN_SIZE);
    }
}
