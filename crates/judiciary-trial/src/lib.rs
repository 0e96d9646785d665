//! Trial agent — authoritative store for a partition of lawsuits
//!
//! A trial owns three disjoint lists (active, dismissed with merit,
//! dismissed without merit), answers per-stage admissibility queries from
//! its district and from peer districts, and mutates lawsuits only on
//! instruction from a district. Every mutation persists before it is
//! acknowledged.

pub mod handlers;
pub mod handshake;
pub mod predicates;
pub mod store;

pub use handlers::TrialAgent;
pub use store::{LawsuitStore, TrialState};
