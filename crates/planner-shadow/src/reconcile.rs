//! Create-or-update for shadow objects
//!
//! Fetch the object at the derived key (or start from a blank one), compare its
//! spec and labels with the desired state, and write only when they differ.
//! Updates reuse the fetched object so its resourceVersion travels with the
//! write and a concurrent writer surfaces as [`Error::Conflict`].

use std::fmt;

use async_trait::async_trait;
use kube::core::object::HasSpec;
use kube::{Resource, ResourceExt};
use tracing::debug;

use planner_common::crd::{GitRepository, Terraform};
use planner_common::{Error, LabelSet, ObjectKey, LABEL_PRIMARY_RESOURCE_KEY, LABEL_PR_ID_KEY};

use crate::identity::is_shadow;
use crate::store::PlannerKubeClient;

/// What a create-or-update did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The object did not exist and was created
    Created,
    /// The object existed and drifted from the desired state
    Updated,
    /// The object already matched; nothing was written
    Unchanged,
}

impl Outcome {
    /// Whether the store was written to
    pub fn is_write(&self) -> bool {
        !matches!(self, Outcome::Unchanged)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Created => write!(f, "created"),
            Outcome::Updated => write!(f, "updated"),
            Outcome::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// A reconciled object together with what happened to it
#[derive(Clone, Debug)]
pub struct Reconciled<K> {
    /// The object as stored after reconciliation
    pub object: K,
    /// Whether it was created, updated or left alone
    pub outcome: Outcome,
}

/// Kinds the planner can create-or-update
///
/// Dispatches the generic combinator onto the typed store methods.
#[async_trait]
pub trait ShadowKind:
    Resource<DynamicType = ()> + HasSpec + Clone + Send + Sync + Sized + 'static
{
    /// A new, unsaved object at `key`
    fn build(key: &ObjectKey, spec: Self::Spec) -> Self;

    /// Fetch the object at `key`
    async fn fetch(store: &dyn PlannerKubeClient, key: &ObjectKey) -> Result<Self, Error>;

    /// Create the object
    async fn create(store: &dyn PlannerKubeClient, obj: &Self) -> Result<Self, Error>;

    /// Replace the object
    async fn update(store: &dyn PlannerKubeClient, obj: &Self) -> Result<Self, Error>;
}

#[async_trait]
impl ShadowKind for Terraform {
    fn build(key: &ObjectKey, spec: Self::Spec) -> Self {
        let mut tf = Terraform::new(&key.name, spec);
        tf.metadata.namespace = Some(key.namespace.clone());
        tf
    }

    async fn fetch(store: &dyn PlannerKubeClient, key: &ObjectKey) -> Result<Self, Error> {
        store.get_terraform(key).await
    }

    async fn create(store: &dyn PlannerKubeClient, obj: &Self) -> Result<Self, Error> {
        store.create_terraform(obj).await
    }

    async fn update(store: &dyn PlannerKubeClient, obj: &Self) -> Result<Self, Error> {
        store.update_terraform(obj).await
    }
}

#[async_trait]
impl ShadowKind for GitRepository {
    fn build(key: &ObjectKey, spec: Self::Spec) -> Self {
        let mut repo = GitRepository::new(&key.name, spec);
        repo.metadata.namespace = Some(key.namespace.clone());
        repo
    }

    async fn fetch(store: &dyn PlannerKubeClient, key: &ObjectKey) -> Result<Self, Error> {
        store.get_git_repository(key).await
    }

    async fn create(store: &dyn PlannerKubeClient, obj: &Self) -> Result<Self, Error> {
        store.create_git_repository(obj).await
    }

    async fn update(store: &dyn PlannerKubeClient, obj: &Self) -> Result<Self, Error> {
        store.update_git_repository(obj).await
    }
}

/// Converge the object at `key` onto `spec` and `labels`
///
/// An existing object is only adopted when it carries the shadow marker and the
/// same primary/change lineage as `labels`; anything else at the key is left
/// untouched and reported as [`Error::NotOwned`].
pub async fn create_or_update<K>(
    store: &dyn PlannerKubeClient,
    key: &ObjectKey,
    spec: K::Spec,
    labels: LabelSet,
) -> Result<Reconciled<K>, Error>
where
    K: ShadowKind,
    K::Spec: PartialEq + Send,
{
    match K::fetch(store, key).await {
        Ok(mut current) => {
            ensure_lineage(&current, key, &labels)?;

            if current.spec() == &spec && current.labels() == &labels {
                debug!(kind = %K::kind(&()), object = %key, "already up to date");
                return Ok(Reconciled {
                    object: current,
                    outcome: Outcome::Unchanged,
                });
            }

            *current.spec_mut() = spec;
            current.meta_mut().labels = Some(labels);
            let object = K::update(store, &current).await?;
            Ok(Reconciled {
                object,
                outcome: Outcome::Updated,
            })
        }
        Err(e) if e.is_not_found() => {
            let mut desired = K::build(key, spec);
            desired.meta_mut().labels = Some(labels);
            let object = K::create(store, &desired).await?;
            Ok(Reconciled {
                object,
                outcome: Outcome::Created,
            })
        }
        Err(e) => Err(e),
    }
}

fn ensure_lineage<K: ShadowKind>(
    current: &K,
    key: &ObjectKey,
    desired: &LabelSet,
) -> Result<(), Error> {
    let labels = current.labels();
    if !is_shadow(labels) {
        return Err(Error::not_owned(
            K::kind(&()),
            key,
            "object exists but is not managed by the branch planner",
        ));
    }
    for label in [LABEL_PRIMARY_RESOURCE_KEY, LABEL_PR_ID_KEY] {
        if labels.get(label) != desired.get(label) {
            return Err(Error::not_owned(
                K::kind(&()),
                key,
                format!(
                    "label {label} is {:?}, expected {:?}",
                    labels.get(label),
                    desired.get(label)
                ),
            ));
        }
    }
    Ok(())
}
