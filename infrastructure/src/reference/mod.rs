//! `gh`-CLI-backed tracker adapter.

mod github;

pub use github::GhTracker;
