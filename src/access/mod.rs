//! Organisation access reconciliation.
//!
//! Keeps an in-memory snapshot of the organisation's access list and uses
//! it to decide whether a user already has access before asking Grist to
//! grant it.

pub mod cache;
pub mod gate;

pub use gate::AccessGate;
