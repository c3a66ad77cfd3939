//! `mailtally` — traffic statistics for Sophos SG/UTM SMTP logs.
//!
//! This crate provides the core library for filtering delivered-mail events
//! out of `smtpd` logs, extracting them into validated records on a bounded
//! worker pool, and folding the records into per-partner-pair statistics.

pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod queue;
