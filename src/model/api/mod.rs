//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - Phases are serialised as the integers 0, 1 and 2.
//! - Datetimes are serialised as RFC 3339 strings.

pub mod account;
pub mod auth;
pub mod session;
pub mod verification;
