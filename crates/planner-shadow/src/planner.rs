//! Planner entry points
//!
//! [`Planner`] ties the store, the access policy and the reconcilers together
//! and is what callers hold on to. Every operation takes a cancellation token;
//! a cancelled operation returns [`Error::Cancelled`] and never reports
//! partial success.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use planner_common::crd::{GitRepository, Terraform};
use planner_common::{Error, LabelSet, ObjectKey, Result};

use crate::cascade;
use crate::guard::AccessPolicy;
use crate::identity::shadow_selector;
use crate::reconcile::Reconciled;
use crate::resource;
use crate::source;
use crate::store::PlannerKubeClient;

/// Default polling interval for shadow sources
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Planner configuration
#[derive(Clone, Debug)]
pub struct PlannerConfig {
    /// Reject source references that leave the Terraform's namespace
    pub no_cross_namespace_refs: bool,
    /// Polling interval used when the caller does not pick one
    pub default_interval: Duration,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            no_cross_namespace_refs: false,
            default_interval: DEFAULT_INTERVAL,
        }
    }
}

/// The shadow source and shadow Terraform of one reconcile
#[derive(Clone, Debug)]
pub struct ShadowPair {
    /// Shadow GitRepository
    pub source: Reconciled<GitRepository>,
    /// Shadow Terraform
    pub resource: Reconciled<Terraform>,
}

/// Branch planner operations over a shared store
#[derive(Clone)]
pub struct Planner {
    store: Arc<dyn PlannerKubeClient>,
    policy: AccessPolicy,
    config: PlannerConfig,
}

impl Planner {
    /// Create a planner over `store`
    pub fn new(store: Arc<dyn PlannerKubeClient>, config: PlannerConfig) -> Self {
        Self {
            store,
            policy: AccessPolicy::new(config.no_cross_namespace_refs),
            config,
        }
    }

    /// Access policy derived from the configuration
    pub fn policy(&self) -> AccessPolicy {
        self.policy
    }

    /// Configuration the planner was built with
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Create or update the shadow of a GitRepository
    pub async fn reconcile_source(
        &self,
        primary: &GitRepository,
        branch: &str,
        change_id: &str,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<Reconciled<GitRepository>> {
        cancellable(
            cancel,
            "reconcile_source",
            source::reconcile_source(self.store.as_ref(), primary, branch, change_id, interval),
        )
        .await
    }

    /// Create or update the shadow pair of a Terraform
    ///
    /// `primary_source` must be the GitRepository `primary` references. The
    /// source kind and access policy are checked before anything is read or
    /// written; the shadow source is reconciled first so the shadow Terraform
    /// never points at a missing source.
    #[instrument(skip(self, primary, primary_source, cancel), fields(terraform = %primary.name_any()))]
    pub async fn reconcile_resource(
        &self,
        primary: &Terraform,
        primary_source: &GitRepository,
        branch: &str,
        change_id: &str,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<ShadowPair> {
        cancellable(
            cancel,
            "reconcile_resource",
            self.reconcile_pair(primary, primary_source, branch, change_id, interval),
        )
        .await
    }

    async fn reconcile_pair(
        &self,
        primary: &Terraform,
        primary_source: &GitRepository,
        branch: &str,
        change_id: &str,
        interval: Duration,
    ) -> Result<ShadowPair> {
        let expected = source::source_key_for(primary, &self.policy)?;
        let supplied = ObjectKey::of(primary_source);
        if supplied.as_ref() != Some(&expected) {
            return Err(Error::validation_for_field(
                "spec.sourceRef",
                format!(
                    "Terraform {} references GitRepository {expected}, got {}",
                    primary.name_any(),
                    supplied
                        .map(|k| k.to_string())
                        .unwrap_or_else(|| primary_source.name_any()),
                ),
            ));
        }

        let store = self.store.as_ref();
        let source =
            source::reconcile_source(store, primary_source, branch, change_id, interval).await?;
        let shadow_source = ObjectKey::of(&source.object).ok_or_else(|| {
            Error::validation_for_field(
                "metadata.namespace",
                "reconciled source has no namespace",
            )
        })?;
        let resource =
            resource::reconcile_resource(store, primary, &shadow_source, branch, change_id)
                .await?;

        Ok(ShadowPair { source, resource })
    }

    /// Delete a shadow Terraform and its shadow source
    pub async fn delete_shadow_pair(
        &self,
        shadow: &Terraform,
        cancel: &CancellationToken,
    ) -> Result<()> {
        cancellable(
            cancel,
            "delete_shadow_pair",
            cascade::delete_shadow_pair(self.store.as_ref(), &self.policy, shadow),
        )
        .await
    }

    /// Get a Terraform
    pub async fn get_resource(
        &self,
        key: &ObjectKey,
        cancel: &CancellationToken,
    ) -> Result<Terraform> {
        cancellable(cancel, "get_resource", self.store.get_terraform(key)).await
    }

    /// List Terraforms in a namespace, optionally filtered by labels
    pub async fn list_resources(
        &self,
        namespace: &str,
        selector: Option<&LabelSet>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Terraform>> {
        let empty = LabelSet::new();
        let selector = selector.unwrap_or(&empty);
        cancellable(
            cancel,
            "list_resources",
            self.store.list_terraforms(namespace, selector),
        )
        .await
    }

    /// List shadow Terraforms, optionally narrowed to one primary and/or change
    pub async fn list_shadow_resources(
        &self,
        namespace: &str,
        primary: Option<&str>,
        change_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Terraform>> {
        let selector = shadow_selector(primary, change_id);
        self.list_resources(namespace, Some(&selector), cancel).await
    }

    /// List GitRepositories in a namespace, optionally filtered by labels
    pub async fn list_sources(
        &self,
        namespace: &str,
        selector: Option<&LabelSet>,
        cancel: &CancellationToken,
    ) -> Result<Vec<GitRepository>> {
        let empty = LabelSet::new();
        let selector = selector.unwrap_or(&empty);
        cancellable(
            cancel,
            "list_sources",
            self.store.list_git_repositories(namespace, selector),
        )
        .await
    }

    /// List shadow GitRepositories, optionally narrowed to one primary and/or change
    pub async fn list_shadow_sources(
        &self,
        namespace: &str,
        primary: Option<&str>,
        change_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<GitRepository>> {
        let selector = shadow_selector(primary, change_id);
        self.list_sources(namespace, Some(&selector), cancel).await
    }

    /// Get a GitRepository
    pub async fn get_source(
        &self,
        key: &ObjectKey,
        cancel: &CancellationToken,
    ) -> Result<GitRepository> {
        cancellable(cancel, "get_source", self.store.get_git_repository(key)).await
    }

    /// Get the GitRepository a Terraform reads from
    pub async fn resolve_source(
        &self,
        tf: &Terraform,
        cancel: &CancellationToken,
    ) -> Result<GitRepository> {
        cancellable(
            cancel,
            "resolve_source",
            source::resolve_source(self.store.as_ref(), &self.policy, tf),
        )
        .await
    }

    /// Get a Secret
    pub async fn get_secret(
        &self,
        key: &ObjectKey,
        cancel: &CancellationToken,
    ) -> Result<Secret> {
        cancellable(cancel, "get_secret", self.store.get_secret(key)).await
    }
}

/// Run `fut` unless `cancel` fires first
async fn cancellable<T, F>(cancel: &CancellationToken, operation: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::cancelled(operation)),
        result = fut => result,
    }
}
