//! Shadow Terraform reconciliation
//!
//! A shadow Terraform runs the primary's configuration against the shadow
//! source, but can only ever plan. It never applies, never forces, and writes
//! its outputs to a Secret of its own.

use kube::ResourceExt;
use tracing::{debug, info, instrument};

use planner_common::crd::{Terraform, TerraformSpec};
use planner_common::{Error, ObjectKey, READABLE_PLAN_HUMAN};

use crate::identity::{derive_labels, derive_name};
use crate::reconcile::{create_or_update, Reconciled};
use crate::source::validate_change;
use crate::store::PlannerKubeClient;

/// Desired spec of a shadow Terraform
///
/// Starts from the primary's spec and then:
/// - points `sourceRef` at the shadow source
/// - forces plan-only mode with a human-readable stored plan
/// - clears `approvePlan` and `force`
/// - renames the outputs Secret so it cannot overwrite the primary's
pub fn shadow_resource_spec(
    primary: &TerraformSpec,
    shadow_source: &ObjectKey,
    branch: &str,
    change_id: &str,
) -> TerraformSpec {
    let mut spec = primary.clone();
    spec.source_ref.name = shadow_source.name.clone();
    spec.source_ref.namespace = Some(shadow_source.namespace.clone());
    spec.plan_only = true;
    spec.store_readable_plan = READABLE_PLAN_HUMAN.to_string();
    spec.approve_plan.clear();
    spec.force = false;
    if let Some(outputs) = spec.write_outputs_to_secret.as_mut() {
        outputs.name = derive_name(&outputs.name, branch, change_id);
    }
    spec
}

/// Create or update the shadow of `primary`, reading from `shadow_source`
#[instrument(skip(store, primary, shadow_source), fields(terraform = %primary.name_any(), source = %shadow_source))]
pub async fn reconcile_resource(
    store: &dyn PlannerKubeClient,
    primary: &Terraform,
    shadow_source: &ObjectKey,
    branch: &str,
    change_id: &str,
) -> Result<Reconciled<Terraform>, Error> {
    if !primary.uses_git_repository() {
        return Err(Error::UnsupportedSourceKind {
            kind: primary.spec.source_ref.kind.clone(),
        });
    }
    validate_change(branch, change_id)?;

    let primary_name = primary.name_any();
    let namespace = primary.namespace().ok_or_else(|| {
        Error::validation_for_field(
            "metadata.namespace",
            format!("Terraform {primary_name} has no namespace"),
        )
    })?;

    let key = ObjectKey::new(namespace, derive_name(&primary_name, branch, change_id));
    let labels = derive_labels(primary.labels(), &primary_name, change_id);
    let spec = shadow_resource_spec(&primary.spec, shadow_source, branch, change_id);

    let reconciled = create_or_update::<Terraform>(store, &key, spec, labels).await?;
    if reconciled.outcome.is_write() {
        info!(
            object = %key,
            operation = %reconciled.outcome,
            "Terraform object successfully reconciled"
        );
    } else {
        debug!(object = %key, "Terraform object already up to date");
    }
    Ok(reconciled)
}
