//! Object store access for the planner
//!
//! All reads and writes go through [`PlannerKubeClient`] so the reconcilers
//! never depend on the transport. The production implementation wraps a
//! kube-rs `Client`; tests use mocks or an in-memory store.

use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::trace;

#[cfg(test)]
use mockall::automock;

use planner_common::crd::{GitRepository, Terraform};
use planner_common::{Error, LabelSet, ObjectKey, COMPONENT_NAME};

// =============================================================================
// Trait for dependency injection and testability
// =============================================================================

/// Typed object store operations used by the planner
///
/// Every method fails with [`Error::NotFound`] when the object is absent, with
/// [`Error::Conflict`] on optimistic-concurrency or already-exists failures,
/// and with [`Error::Store`] otherwise. Nothing here retries.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PlannerKubeClient: Send + Sync {
    /// Get a Terraform object
    async fn get_terraform(&self, key: &ObjectKey) -> Result<Terraform, Error>;

    /// List Terraform objects in a namespace matching every label in `selector`
    async fn list_terraforms(
        &self,
        namespace: &str,
        selector: &LabelSet,
    ) -> Result<Vec<Terraform>, Error>;

    /// Create a Terraform object
    async fn create_terraform(&self, tf: &Terraform) -> Result<Terraform, Error>;

    /// Replace a Terraform object; the object's resourceVersion is checked
    async fn update_terraform(&self, tf: &Terraform) -> Result<Terraform, Error>;

    /// Delete a Terraform object
    async fn delete_terraform(&self, key: &ObjectKey) -> Result<(), Error>;

    /// Get a GitRepository
    async fn get_git_repository(&self, key: &ObjectKey) -> Result<GitRepository, Error>;

    /// List GitRepositories in a namespace matching every label in `selector`
    async fn list_git_repositories(
        &self,
        namespace: &str,
        selector: &LabelSet,
    ) -> Result<Vec<GitRepository>, Error>;

    /// Create a GitRepository
    async fn create_git_repository(&self, repo: &GitRepository) -> Result<GitRepository, Error>;

    /// Replace a GitRepository; the object's resourceVersion is checked
    async fn update_git_repository(&self, repo: &GitRepository) -> Result<GitRepository, Error>;

    /// Delete a GitRepository
    async fn delete_git_repository(&self, key: &ObjectKey) -> Result<(), Error>;

    /// Get a Secret (e.g., a shadow's relocated outputs)
    async fn get_secret(&self, key: &ObjectKey) -> Result<Secret, Error>;
}

/// Render a label map as a Kubernetes equality selector ("a=b,c=d")
pub fn label_selector(labels: &LabelSet) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

// =============================================================================
// kube-rs implementation
// =============================================================================

/// Real Kubernetes client implementation
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    /// Create a new KubeStore wrapping the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn get<K>(&self, key: &ObjectKey) -> Result<K, Error>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Debug,
    {
        let kind = K::kind(&());
        trace!(kind = %kind, object = %key, "get");
        self.api::<K>(&key.namespace)
            .get(&key.name)
            .await
            .map_err(|e| Error::from_kube("get", &kind, key, e))
    }

    async fn list<K>(&self, namespace: &str, selector: &LabelSet) -> Result<Vec<K>, Error>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Debug,
    {
        let kind = K::kind(&());
        let mut params = ListParams::default();
        if !selector.is_empty() {
            params = params.labels(&label_selector(selector));
        }
        trace!(kind = %kind, namespace = %namespace, selector = ?selector, "list");
        let list = self
            .api::<K>(namespace)
            .list(&params)
            .await
            .map_err(|e| Error::from_kube("list", &kind, &ObjectKey::new(namespace, ""), e))?;
        Ok(list.items)
    }

    async fn create<K>(&self, obj: &K) -> Result<K, Error>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + Serialize
            + DeserializeOwned
            + Debug,
    {
        let kind = K::kind(&());
        let key = require_key(obj, &kind)?;
        trace!(kind = %kind, object = %key, "create");
        self.api::<K>(&key.namespace)
            .create(&post_params(), obj)
            .await
            .map_err(|e| Error::from_kube("create", &kind, &key, e))
    }

    async fn update<K>(&self, obj: &K) -> Result<K, Error>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + Serialize
            + DeserializeOwned
            + Debug,
    {
        let kind = K::kind(&());
        let key = require_key(obj, &kind)?;
        trace!(kind = %kind, object = %key, "update");
        self.api::<K>(&key.namespace)
            .replace(&key.name, &post_params(), obj)
            .await
            .map_err(|e| Error::from_kube("update", &kind, &key, e))
    }

    async fn delete<K>(&self, key: &ObjectKey) -> Result<(), Error>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Debug,
    {
        let kind = K::kind(&());
        trace!(kind = %kind, object = %key, "delete");
        self.api::<K>(&key.namespace)
            .delete(&key.name, &DeleteParams::background())
            .await
            .map_err(|e| Error::from_kube("delete", &kind, key, e))?;
        Ok(())
    }
}

/// Write parameters recording the planner as field manager
fn post_params() -> PostParams {
    PostParams {
        field_manager: Some(COMPONENT_NAME.to_string()),
        ..Default::default()
    }
}

fn require_key<K: Resource>(obj: &K, kind: &str) -> Result<ObjectKey, Error> {
    ObjectKey::of(obj).ok_or_else(|| {
        Error::validation_for_field(
            "metadata.namespace",
            format!("{kind} object has no namespace"),
        )
    })
}

#[async_trait]
impl PlannerKubeClient for KubeStore {
    async fn get_terraform(&self, key: &ObjectKey) -> Result<Terraform, Error> {
        self.get(key).await
    }

    async fn list_terraforms(
        &self,
        namespace: &str,
        selector: &LabelSet,
    ) -> Result<Vec<Terraform>, Error> {
        self.list(namespace, selector).await
    }

    async fn create_terraform(&self, tf: &Terraform) -> Result<Terraform, Error> {
        self.create(tf).await
    }

    async fn update_terraform(&self, tf: &Terraform) -> Result<Terraform, Error> {
        self.update(tf).await
    }

    async fn delete_terraform(&self, key: &ObjectKey) -> Result<(), Error> {
        self.delete::<Terraform>(key).await
    }

    async fn get_git_repository(&self, key: &ObjectKey) -> Result<GitRepository, Error> {
        self.get(key).await
    }

    async fn list_git_repositories(
        &self,
        namespace: &str,
        selector: &LabelSet,
    ) -> Result<Vec<GitRepository>, Error> {
        self.list(namespace, selector).await
    }

    async fn create_git_repository(&self, repo: &GitRepository) -> Result<GitRepository, Error> {
        self.create(repo).await
    }

    async fn update_git_repository(&self, repo: &GitRepository) -> Result<GitRepository, Error> {
        self.update(repo).await
    }

    async fn delete_git_repository(&self, key: &ObjectKey) -> Result<(), Error> {
        self.delete::<GitRepository>(key).await
    }

    async fn get_secret(&self, key: &ObjectKey) -> Result<Secret, Error> {
        self.get(key).await
    }
}
