//! Branch-scoped shadow reconciliation for Terraform and GitRepository objects
//!
//! For a primary Terraform and the GitRepository it reads from, the planner
//! maintains a plan-only copy of both that tracks a change branch instead of
//! the primary's ref. Shadows are named and labelled deterministically from
//! (primary, branch, change-id), so repeated reconciles converge without
//! writing and a merged change can be cleaned up by lineage.

#![deny(missing_docs)]

pub mod cascade;
pub mod guard;
pub mod identity;
pub mod planner;
pub mod reconcile;
pub mod resource;
pub mod source;
pub mod store;

#[cfg(test)]
mod testing;

pub use guard::AccessPolicy;
pub use planner::{Planner, PlannerConfig, ShadowPair, DEFAULT_INTERVAL};
pub use reconcile::{Outcome, Reconciled};
pub use store::{KubeStore, PlannerKubeClient};
