//! Provisioning pipeline for an empty, snapshot-ready PowerVS LPAR.
//!
//! authenticate → ensure public network → create LPAR (bounded retry) →
//! poll to a terminal status → optional chain trigger. Failures between
//! authentication and polling roll back what the run created.

pub mod chain;
pub mod logger;
pub mod network;
pub mod pipeline;
pub mod poller;
pub mod provider_manager;
pub mod provisioning;
pub mod retry;
pub mod rollback;
pub mod session;
pub mod state_machine;

pub use pipeline::{run, RunOutcome};
pub use state_machine::{RunState, Step};
