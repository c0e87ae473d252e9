//! GitRepository Custom Resource (source.toolkit.fluxcd.io/v1)

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::is_false;

/// Specification for a Flux GitRepository source
///
/// Example:
/// ```yaml
/// apiVersion: source.toolkit.fluxcd.io/v1
/// kind: GitRepository
/// metadata:
///   name: web
///   namespace: team
/// spec:
///   url: https://github.com/example/web
///   interval: 1m0s
///   ref:
///     branch: main
///   secretRef:
///     name: web-git-auth
/// ```
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "source.toolkit.fluxcd.io",
    version = "v1",
    kind = "GitRepository",
    plural = "gitrepositories",
    shortname = "gitrepo",
    namespaced,
    status = "GitRepositoryStatus",
    printcolumn = r#"{"name":"URL","type":"string","jsonPath":".spec.url"}"#,
    printcolumn = r#"{"name":"Branch","type":"string","jsonPath":".spec.ref.branch"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct GitRepositorySpec {
    /// Repository URL
    pub url: String,

    /// Secret holding the git credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<LocalObjectReference>,

    /// How often the repository is polled (Go duration string)
    pub interval: String,

    /// Timeout for git operations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// Git reference to check out
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<GitRepositoryRef>,

    /// Suspend polling
    #[serde(default, skip_serializing_if = "is_false")]
    pub suspend: bool,

    /// Every other spec field, preserved verbatim
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Git reference selector
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GitRepositoryRef {
    /// Branch to check out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    /// Tag to check out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// SemVer range to check out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semver: Option<String>,

    /// Full reference name (e.g., "refs/pull/42/head")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Commit SHA to check out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

/// Reference to an object in the same namespace
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct LocalObjectReference {
    /// Name of the referent
    pub name: String,
}

/// Observed state of a GitRepository
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GitRepositoryStatus {
    /// Generation last processed by the source controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Remaining status fields, preserved verbatim
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl GitRepository {
    /// Branch the repository is pinned to, if any
    pub fn branch(&self) -> Option<&str> {
        self.spec
            .reference
            .as_ref()
            .and_then(|r| r.branch.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flux_source() {
        let yaml = r#"
apiVersion: source.toolkit.fluxcd.io/v1
kind: GitRepository
metadata:
  name: web
  namespace: team
spec:
  url: https://github.com/example/web
  interval: 1m0s
  ref:
    branch: main
  secretRef:
    name: web-git-auth
  ignore: |
    /docs
"#;
        let repo: GitRepository = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(repo.spec.url, "https://github.com/example/web");
        assert_eq!(repo.branch(), Some("main"));
        assert_eq!(
            repo.spec.secret_ref,
            Some(LocalObjectReference {
                name: "web-git-auth".to_string()
            })
        );
        assert!(repo.spec.extra.contains_key("ignore"));
    }

    #[test]
    fn reference_serializes_as_ref() {
        let spec = GitRepositorySpec {
            url: "https://github.com/example/web".to_string(),
            secret_ref: None,
            interval: "5m0s".to_string(),
            timeout: None,
            reference: Some(GitRepositoryRef {
                branch: Some("feature-x".to_string()),
                ..Default::default()
            }),
            suspend: false,
            extra: BTreeMap::new(),
        };
        let json = serde_json::to_value(&spec).expect("serialize");
        assert_eq!(json["ref"]["branch"], "feature-x");
        assert!(json.get("reference").is_none());
        assert!(json.get("suspend").is_none());
    }

    #[test]
    fn missing_ref_has_no_branch() {
        let yaml = r#"
apiVersion: source.toolkit.fluxcd.io/v1
kind: GitRepository
metadata:
  name: web
spec:
  url: https://github.com/example/web
  interval: 1m0s
"#;
        let repo: GitRepository = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(repo.branch(), None);
    }
}
