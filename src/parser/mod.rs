//! Log parsing: file scanning, the delivery-event filter, and record extraction.

pub mod extract;
pub mod filter;
pub mod scan;
