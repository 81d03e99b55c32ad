//! ledgerseal: RSA-OAEP wrapped AES-256-GCM file encryption with an
//! append-only ledger of encryption records and an audit trail.
//!
//! The binary is a thin clap front end over these modules; integration tests
//! use them directly.
pub mod api;
pub mod audit;
pub mod config;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod keys;
pub mod ledger;
pub mod pipeline;
pub mod record;
pub mod telemetry;

#[cfg(test)]
mod test_support;
