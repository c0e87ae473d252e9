//! Terraform Custom Resource (infra.contrib.fluxcd.io/v1alpha2)
//!
//! Only the fields the planner reads or overrides are typed. Everything else
//! in the spec is carried through `extra` untouched, so a cloned spec never
//! loses fields this crate does not know about.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::is_false;

/// Kind name of the only source type the planner can mirror
pub const GIT_REPOSITORY_KIND: &str = "GitRepository";

/// Specification for a Terraform object
///
/// Example:
/// ```yaml
/// apiVersion: infra.contrib.fluxcd.io/v1alpha2
/// kind: Terraform
/// metadata:
///   name: web
///   namespace: team
/// spec:
///   interval: 1m
///   path: ./infra
///   approvePlan: auto
///   sourceRef:
///     kind: GitRepository
///     name: web
///   writeOutputsToSecret:
///     name: web-outputs
/// ```
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "infra.contrib.fluxcd.io",
    version = "v1alpha2",
    kind = "Terraform",
    plural = "terraforms",
    shortname = "tf",
    namespaced,
    status = "TerraformStatus",
    printcolumn = r#"{"name":"Plan Only","type":"boolean","jsonPath":".spec.planOnly"}"#,
    printcolumn = r#"{"name":"Source","type":"string","jsonPath":".spec.sourceRef.name"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct TerraformSpec {
    /// Source the Terraform configuration is pulled from
    pub source_ref: CrossNamespaceSourceReference,

    /// Path to the configuration inside the source artifact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Reconcile interval (Go duration string)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,

    /// Only compute a plan, never apply it
    #[serde(default, skip_serializing_if = "is_false")]
    pub plan_only: bool,

    /// Store the plan in a readable form ("none", "json", "human")
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub store_readable_plan: String,

    /// Write Terraform outputs to a Secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_outputs_to_secret: Option<WriteOutputsToSecretSpec>,

    /// Plan approval token ("auto" or a pending plan id)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub approve_plan: String,

    /// Force-apply even when the plan would be rejected
    #[serde(default, skip_serializing_if = "is_false")]
    pub force: bool,

    /// Every other spec field, preserved verbatim
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Reference to a source object, possibly in another namespace
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CrossNamespaceSourceReference {
    /// API version of the referent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// Kind of the referent (e.g., "GitRepository")
    pub kind: String,

    /// Name of the referent
    pub name: String,

    /// Namespace of the referent; defaults to the Terraform's namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Where Terraform outputs are written
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WriteOutputsToSecretSpec {
    /// Name of the Secret
    pub name: String,

    /// Labels added to the Secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,

    /// Annotations added to the Secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,

    /// Subset of outputs to write; all outputs when empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<String>,
}

/// Observed state of a Terraform object
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TerraformStatus {
    /// Generation last processed by the Terraform controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Remaining status fields, preserved verbatim
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Terraform {
    /// Whether this object reads its configuration from a GitRepository
    pub fn uses_git_repository(&self) -> bool {
        self.spec.source_ref.kind == GIT_REPOSITORY_KIND
    }

    /// Name of the outputs Secret, if outputs are written to one
    pub fn outputs_secret_name(&self) -> Option<&str> {
        self.spec
            .write_outputs_to_secret
            .as_ref()
            .map(|w| w.name.as_str())
    }
}
