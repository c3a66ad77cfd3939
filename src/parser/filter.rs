//! Cheap pre-filter selecting delivered-message events from raw log lines.

/// Substrings a line must contain, all of them, to describe a passed mail:
/// the SMTP daemon tag, the event name, and the event id.
pub const DELIVERY_MARKERS: [&str; 3] = ["smtpd[", r#"name="email passed""#, r#"id="1000""#];

/// Whether `line` is a delivered-message event worth extracting.
///
/// Most log lines are irrelevant; rejection is not an error.
#[inline]
pub fn is_delivery_event(line: &str) -> bool {
    DELIVERY_MARKERS.iter().all(|marker| line.contains(marker))
}
