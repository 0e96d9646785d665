//! District agent — coordinator of the admissibility pipeline
//!
//! A district originates filings for its jurisdiction, owns the roster of
//! its trials, mirrors the Court's district directory, and answers
//! aggregate `lawsuit_query` requests from peer districts by consulting
//! every trial it owns.

pub mod court;
pub mod handlers;
pub mod identity;
pub mod pipeline;
pub mod roster;

pub use handlers::{DistrictAgent, DistrictConfig};
pub use roster::{DistrictMirror, TrialRoster};
