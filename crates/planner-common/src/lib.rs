//! Common types for the branch planner: CRDs, errors, and utilities

#![deny(missing_docs)]

pub mod crd;
pub mod duration;
pub mod error;
pub mod key;
pub mod telemetry;

pub use error::Error;
pub use key::ObjectKey;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Ordered label map; merges are deterministic and the newer value wins.
pub type LabelSet = std::collections::BTreeMap<String, String>;

/// Marker label identifying objects created by the branch planner
pub const LABEL_KEY: &str = "infra.weave.works/branch-planner";

/// Value of the marker label
pub const LABEL_VALUE: &str = "true";

/// Label recording the name of the primary object a shadow was derived from
pub const LABEL_PRIMARY_RESOURCE_KEY: &str = "infra.weave.works/primary-resource";

/// Label recording the change-request (pull request) identifier
pub const LABEL_PR_ID_KEY: &str = "infra.weave.works/pr-id";

/// Plan storage mode written to every shadow Terraform
pub const READABLE_PLAN_HUMAN: &str = "human";

/// Field manager recorded on every create and replace
pub const COMPONENT_NAME: &str = "branch-planner";
