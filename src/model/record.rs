//! Validated record of one delivered message.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::address::{split_address, HostClassifier, HostType};

/// Size recorded when the log line carries no usable `size` field.
pub const UNKNOWN_SIZE: i64 = -1;

/// One delivered message, as extracted from a single log line.
///
/// Records are immutable once built. `mail_id` is the logical primary key:
/// identical extractions always produce the same id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailRecord {
    #[serde(rename = "mailID")]
    pub mail_id: String,
    #[serde(rename = "queueID")]
    pub queue_id: String,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM:SS`
    pub time: String,
    pub from: String,
    pub host_from: String,
    pub user_from: String,
    pub type_from: HostType,
    pub to: String,
    pub host_to: String,
    pub user_to: String,
    pub type_to: HostType,
    /// Byte count, or [`UNKNOWN_SIZE`].
    pub size: i64,
    pub subject: String,
}

/// The raw fields a [`MailRecord`] is built from.
#[derive(Debug, Clone, Default)]
pub struct MailParts {
    pub queue_id: String,
    pub date: String,
    pub time: String,
    pub from: String,
    pub to: String,
    pub size: i64,
    pub subject: String,
}

impl MailRecord {
    /// Build a record: split both addresses, classify their hosts and derive the id.
    pub fn build(parts: MailParts, classifier: &HostClassifier) -> Self {
        let (user_from, host_from) = owned_split(&parts.from);
        let (user_to, host_to) = owned_split(&parts.to);
        let mail_id = mail_id(
            &parts.queue_id,
            &parts.date,
            &parts.time,
            &parts.from,
            &parts.to,
        );

        Self {
            mail_id,
            type_from: classifier.classify(&host_from),
            host_from,
            user_from,
            type_to: classifier.classify(&host_to),
            host_to,
            user_to,
            queue_id: parts.queue_id,
            date: parts.date,
            time: parts.time,
            from: parts.from,
            to: parts.to,
            size: parts.size,
            subject: parts.subject,
        }
    }

    /// Whether the size field could not be read from the log.
    pub fn has_unknown_size(&self) -> bool {
        self.size == UNKNOWN_SIZE
    }
}

fn owned_split(address: &str) -> (String, String) {
    let (user, host) = split_address(address);
    (user.to_string(), host.to_string())
}

/// Hex-encoded SHA-256 over `"{queue_id} {date} {time} {from} {to}"`.
pub fn mail_id(queue_id: &str, date: &str, time: &str, from: &str, to: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{queue_id} {date} {time} {from} {to}").as_bytes());
    format!("{:x}", hasher.finalize())
}
