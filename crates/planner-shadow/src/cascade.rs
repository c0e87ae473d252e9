//! Deletion of a shadow Terraform and the shadow source it reads from
//!
//! The source goes first and is best effort: if it cannot be resolved or
//! deleted the failure is logged and the Terraform is still removed. Deleting
//! the Terraform is mandatory and its failure is returned. Between the two
//! steps a source may already be gone while its Terraform remains.

use kube::ResourceExt;
use tracing::{info, instrument, warn};

use planner_common::crd::Terraform;
use planner_common::{Error, ObjectKey};

use crate::guard::AccessPolicy;
use crate::identity::is_shadow;
use crate::source::source_key_for;
use crate::store::PlannerKubeClient;

/// Delete a shadow Terraform and its shadow source
#[instrument(skip(store, policy, shadow), fields(terraform = %shadow.name_any()))]
pub async fn delete_shadow_pair(
    store: &dyn PlannerKubeClient,
    policy: &AccessPolicy,
    shadow: &Terraform,
) -> Result<(), Error> {
    let key = ObjectKey::of(shadow).ok_or_else(|| {
        Error::validation_for_field(
            "metadata.namespace",
            format!("Terraform {} has no namespace", shadow.name_any()),
        )
    })?;
    if !is_shadow(shadow.labels()) {
        return Err(Error::not_owned(
            "Terraform",
            &key,
            "only objects created by the branch planner can be deleted",
        ));
    }

    if let Err(e) = delete_shadow_source(store, policy, shadow).await {
        warn!(error = %e, terraform = %key, "unable to delete Source for Terraform");
    }

    store.delete_terraform(&key).await?;
    info!(terraform = %key, "Terraform object deleted");
    Ok(())
}

async fn delete_shadow_source(
    store: &dyn PlannerKubeClient,
    policy: &AccessPolicy,
    shadow: &Terraform,
) -> Result<(), Error> {
    let source_key = source_key_for(shadow, policy)?;
    let source = store.get_git_repository(&source_key).await?;
    if !is_shadow(source.labels()) {
        return Err(Error::not_owned(
            "GitRepository",
            &source_key,
            "source is not a branch planner shadow, leaving it in place",
        ));
    }
    store.delete_git_repository(&source_key).await?;
    info!(source = %source_key, "Source deleted");
    Ok(())
}
