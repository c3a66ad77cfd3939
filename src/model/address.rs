//! Email address validation, splitting, and internal/external host classification.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// RFC 5321-ish address syntax: dot-atom local part, LDH domain labels.
static VALID_EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("valid email regex")
});

/// Check whether `address` is a syntactically valid `local@domain` address.
///
/// # Examples
/// - `"user@example.com"` → `true`
/// - `"user@"`, `"@example.com"`, `"a b@example.com"` → `false`
pub fn is_valid_email(address: &str) -> bool {
    VALID_EMAIL.is_match(address)
}

/// Split an address into `(user, host)` at the first `@`.
///
/// A string without `@` yields the whole input as user and an empty host.
pub fn split_address(address: &str) -> (&str, &str) {
    address.split_once('@').unwrap_or((address, ""))
}

/// Whether a host belongs to the local organisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostType {
    Internal,
    External,
}

impl HostType {
    /// First letter, used to build partner type tags such as `i2e`.
    pub fn initial(self) -> char {
        match self {
            Self::Internal => 'i',
            Self::External => 'e',
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::External => "external",
        }
    }
}

impl std::fmt::Display for HostType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How configured internal hosts are compared against a mail host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostMatch {
    /// The host must equal a configured entry.
    #[default]
    Exact,
    /// The host must equal a configured entry or be a subdomain of one.
    Suffix,
}

/// Classifies hosts as internal or external against a configured host set.
#[derive(Debug, Clone, Default)]
pub struct HostClassifier {
    hosts: HashSet<String>,
    mode: HostMatch,
}

impl HostClassifier {
    /// Build a classifier from a list of internal host names.
    ///
    /// Entries are trimmed; empty entries are ignored.
    pub fn new<I, S>(hosts: I, mode: HostMatch) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let hosts = hosts
            .into_iter()
            .map(|h| h.as_ref().trim().to_string())
            .filter(|h| !h.is_empty())
            .collect();
        Self { hosts, mode }
    }

    /// Classify a single host.
    pub fn classify(&self, host: &str) -> HostType {
        if self.is_internal(host) {
            HostType::Internal
        } else {
            HostType::External
        }
    }

    pub fn is_internal(&self, host: &str) -> bool {
        if self.hosts.contains(host) {
            return true;
        }
        match self.mode {
            HostMatch::Exact => false,
            HostMatch::Suffix => self.hosts.iter().any(|internal| {
                host.strip_suffix(internal.as_str())
                    .is_some_and(|rest| rest.ends_with('.'))
            }),
        }
    }

    /// Number of configured internal hosts.
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}
