//! Custom Resource types the planner reads and writes
//!
//! These mirror the Flux Terraform controller and Flux source controller
//! APIs. The planner never installs these CRDs; it only consumes them.

mod git_repository;
mod terraform;

pub use git_repository::{
    GitRepository, GitRepositoryRef, GitRepositorySpec, GitRepositoryStatus, LocalObjectReference,
};
pub use terraform::{
    CrossNamespaceSourceReference, Terraform, TerraformSpec, TerraformStatus,
    WriteOutputsToSecretSpec, GIT_REPOSITORY_KIND,
};

/// Serde helper so `false` flags are omitted like Go's `omitempty`
pub(crate) fn is_false(b: &bool) -> bool {
    !*b
}
