//! churnwatch-core: data layer for the churn-risk dashboard.
//!
//! Layering, leaves first:
//!   types / config / clock / error
//!   fallback             curated records served when live data is missing
//!   remote               analytics API seam (HTTP client + in-process fake)
//!   reconciliation       total operations merging live and fallback data
//!   analytics            alert board and ROI views over reconciled data
//!   poller               cancellable periodic refresh bound to a view
//!   summary_store        single-record agent analysis store
//!   server               HTTP surface over the store and the reconciler

pub mod analytics;
pub mod clock;
pub mod config;
pub mod error;
pub mod fallback;
pub mod poller;
pub mod reconciliation;
pub mod remote;
pub mod server;
pub mod summary_store;
pub mod types;
