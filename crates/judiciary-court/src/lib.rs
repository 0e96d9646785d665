//! Court agent — the read-mostly district directory
//!
//! Districts register themselves, poll the directory before fanning out,
//! and report trial-count changes. The Court never queries anyone.

pub mod directory;
pub mod handlers;

pub use directory::DistrictDirectory;
pub use handlers::CourtAgent;
