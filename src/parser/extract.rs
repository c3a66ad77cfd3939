//! Turn one qualifying log line into a validated [`MailRecord`].
//!
//! Field matrix:
//!
//! | field     | absent / empty            | malformed                |
//! |-----------|---------------------------|--------------------------|
//! | timestamp | `malformed-timestamp`     | `malformed-timestamp`    |
//! | from      | `missing-from`            | `invalid-from-address`   |
//! | to        | `missing-to`              | `invalid-to-address`     |
//! | subject   | `missing-subject` (empty is accepted unless strict) | – |
//! | size      | `-1`                      | `-1`                     |
//! | queueid   | `missing-queue-id`        | –                        |

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;

use crate::error::ExtractionFailure;
use crate::model::address::{is_valid_email, HostClassifier};
use crate::model::line::LogLine;
use crate::model::record::{MailParts, MailRecord, UNKNOWN_SIZE};

static RE_FROM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\sfrom="(.*?)""#).expect("valid from regex"));
static RE_TO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\sto="(.*?)""#).expect("valid to regex"));
static RE_SUBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\ssubject="(.*?)""#).expect("valid subject regex"));
static RE_SIZE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\ssize="(.*?)""#).expect("valid size regex"));
static RE_QUEUE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\squeueid="(.*?)""#).expect("valid queueid regex"));

/// Extracts mail records from log lines.
///
/// Holds only read-only configuration, so one instance is shared by all workers.
#[derive(Debug, Clone, Default)]
pub struct RecordExtractor {
    classifier: HostClassifier,
    strict_subject: bool,
}

impl RecordExtractor {
    /// `strict_subject` rejects lines whose subject is present but empty.
    pub fn new(classifier: HostClassifier, strict_subject: bool) -> Self {
        Self {
            classifier,
            strict_subject,
        }
    }

    pub fn classifier(&self) -> &HostClassifier {
        &self.classifier
    }

    /// Extract a record from a queued log line.
    pub fn extract_line(&self, line: &LogLine) -> Result<MailRecord, ExtractionFailure> {
        self.extract(&line.content)
    }

    /// Extract a record from raw line text.
    pub fn extract(&self, line: &str) -> Result<MailRecord, ExtractionFailure> {
        let (date, time) = split_timestamp(line)?;

        let from = match capture(&RE_FROM, line) {
            None | Some("") => return Err(ExtractionFailure::MissingFrom),
            Some(addr) if !is_valid_email(addr) => {
                return Err(ExtractionFailure::InvalidFromAddress(addr.to_string()))
            }
            Some(addr) => addr,
        };

        let to = match capture(&RE_TO, line) {
            None | Some("") => return Err(ExtractionFailure::MissingTo),
            Some(addr) if !is_valid_email(addr) => {
                return Err(ExtractionFailure::InvalidToAddress(addr.to_string()))
            }
            Some(addr) => addr,
        };

        let subject = match capture(&RE_SUBJECT, line) {
            None => return Err(ExtractionFailure::MissingSubject),
            Some("") if self.strict_subject => return Err(ExtractionFailure::MissingSubject),
            Some(subject) => subject,
        };

        let size = capture(&RE_SIZE, line).map_or(UNKNOWN_SIZE, parse_size);

        let queue_id = match capture(&RE_QUEUE_ID, line) {
            None | Some("") => return Err(ExtractionFailure::MissingQueueId),
            Some(id) => id,
        };

        Ok(MailRecord::build(
            MailParts {
                queue_id: queue_id.to_string(),
                date,
                time,
                from: from.to_string(),
                to: to.to_string(),
                size,
                subject: subject.to_string(),
            },
            &self.classifier,
        ))
    }
}

/// Split the leading `YYYY:MM:DD-HH:MM:SS` token into `("YYYY-MM-DD", "HH:MM:SS")`.
///
/// The time never contains `-`, so the split happens at the last `-` of the
/// token; colons in the date part become dashes. Dash-separated dates
/// (`2024-01-02-03:04:05`) are accepted as well.
pub fn split_timestamp(line: &str) -> Result<(String, String), ExtractionFailure> {
    let malformed = || {
        let token: String = line.chars().take(32).collect();
        ExtractionFailure::MalformedTimestamp(token)
    };

    let (token, _) = line.split_once(char::is_whitespace).ok_or_else(malformed)?;
    let (date_raw, time_raw) = token.rsplit_once('-').ok_or_else(malformed)?;

    let date = NaiveDate::parse_from_str(&date_raw.replace(':', "-"), "%Y-%m-%d")
        .map_err(|_| malformed())?;
    let time = NaiveTime::parse_from_str(time_raw, "%H:%M:%S").map_err(|_| malformed())?;

    Ok((
        date.format("%Y-%m-%d").to_string(),
        time.format("%H:%M:%S").to_string(),
    ))
}

/// Parse a size field. Unparsable or negative values become [`UNKNOWN_SIZE`].
fn parse_size(raw: &str) -> i64 {
    raw.parse::<i64>()
        .ok()
        .filter(|n| *n >= 0)
        .unwrap_or(UNKNOWN_SIZE)
}

fn capture<'a>(re: &Regex, line: &'a str) -> Option<&'a str> {
    re.captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}
