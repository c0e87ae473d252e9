//! Shadow GitRepository reconciliation
//!
//! The shadow source is a copy of the primary's spec that tracks the change
//! branch instead of the primary's ref, polled at the planner's interval.

use std::time::Duration;

use kube::ResourceExt;
use tracing::{debug, info, instrument};

use planner_common::crd::{GitRepository, GitRepositorySpec, Terraform, GIT_REPOSITORY_KIND};
use planner_common::duration::format_go_duration;
use planner_common::{Error, ObjectKey};

use crate::guard::AccessPolicy;
use crate::identity::{derive_labels, derive_name, is_valid_label_value};
use crate::reconcile::{create_or_update, Reconciled};
use crate::store::PlannerKubeClient;

/// Desired spec of the shadow source: the primary's spec on `branch`, polled every `interval`
///
/// Only `ref.branch` and `interval` change. Everything else, including tag,
/// semver or commit pins, credentials and ignore rules, is copied as-is.
pub fn shadow_source_spec(
    primary: &GitRepositorySpec,
    branch: &str,
    interval: Duration,
) -> GitRepositorySpec {
    let mut spec = primary.clone();
    spec.reference.get_or_insert_with(Default::default).branch = Some(branch.to_string());
    spec.interval = format_go_duration(interval);
    spec
}

/// Create or update the shadow of `primary` for `branch` and `change_id`
#[instrument(skip(store, primary), fields(source = %primary.name_any()))]
pub async fn reconcile_source(
    store: &dyn PlannerKubeClient,
    primary: &GitRepository,
    branch: &str,
    change_id: &str,
    interval: Duration,
) -> Result<Reconciled<GitRepository>, Error> {
    validate_change(branch, change_id)?;
    if interval.is_zero() {
        return Err(Error::validation_for_field(
            "spec.interval",
            "polling interval must be greater than zero",
        ));
    }

    let primary_name = primary.name_any();
    let namespace = primary.namespace().ok_or_else(|| {
        Error::validation_for_field(
            "metadata.namespace",
            format!("GitRepository {primary_name} has no namespace"),
        )
    })?;

    let key = ObjectKey::new(namespace, derive_name(&primary_name, branch, change_id));
    let labels = derive_labels(primary.labels(), &primary_name, change_id);
    let spec = shadow_source_spec(&primary.spec, branch, interval);

    let reconciled = create_or_update::<GitRepository>(store, &key, spec, labels).await?;
    if reconciled.outcome.is_write() {
        info!(
            object = %key,
            operation = %reconciled.outcome,
            "Source successfully reconciled"
        );
    } else {
        debug!(object = %key, "Source already up to date");
    }
    Ok(reconciled)
}

/// Key of the GitRepository a Terraform reads from, after kind and access checks
///
/// An unset `sourceRef.namespace` means the Terraform's own namespace.
pub fn source_key_for(tf: &Terraform, policy: &AccessPolicy) -> Result<ObjectKey, Error> {
    if !tf.uses_git_repository() {
        return Err(Error::UnsupportedSourceKind {
            kind: tf.spec.source_ref.kind.clone(),
        });
    }

    let owner_namespace = tf.namespace().ok_or_else(|| {
        Error::validation_for_field(
            "metadata.namespace",
            format!("Terraform {} has no namespace", tf.name_any()),
        )
    })?;
    let source_ref = &tf.spec.source_ref;
    let namespace = source_ref
        .namespace
        .clone()
        .filter(|ns| !ns.is_empty())
        .unwrap_or_else(|| owner_namespace.clone());
    let key = ObjectKey::new(namespace, source_ref.name.clone());

    policy.check(&owner_namespace, GIT_REPOSITORY_KIND, &key)?;
    Ok(key)
}

/// Fetch the GitRepository a Terraform reads from
pub async fn resolve_source(
    store: &dyn PlannerKubeClient,
    policy: &AccessPolicy,
    tf: &Terraform,
) -> Result<GitRepository, Error> {
    let key = source_key_for(tf, policy)?;
    store.get_git_repository(&key).await
}

/// Reject inputs that cannot produce a valid shadow identity
pub(crate) fn validate_change(branch: &str, change_id: &str) -> Result<(), Error> {
    if branch.trim().is_empty() {
        return Err(Error::validation_for_field("branch", "branch must not be empty"));
    }
    if change_id.is_empty() {
        return Err(Error::validation_for_field(
            "changeId",
            "change-id must not be empty",
        ));
    }
    if !is_valid_label_value(change_id) {
        return Err(Error::validation_for_field(
            "changeId",
            format!("change-id {change_id:?} is not a valid label value"),
        ));
    }
    Ok(())
}
