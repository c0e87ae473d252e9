//! In-memory object store and fixtures for tests
//!
//! Behaves like the API server for the parts the planner relies on: 404 on
//! missing objects, 409 on create-over-existing and on stale resourceVersion,
//! and equality label selectors on list.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::ObjectMeta;
use kube::{Resource, ResourceExt};
use tokio::sync::Notify;

use planner_common::crd::{
    CrossNamespaceSourceReference, GitRepository, GitRepositoryRef, GitRepositorySpec,
    LocalObjectReference, Terraform, TerraformSpec, WriteOutputsToSecretSpec,
};
use planner_common::{Error, LabelSet, ObjectKey};

use crate::store::PlannerKubeClient;

#[derive(Default)]
pub struct MemoryStore {
    terraforms: Mutex<BTreeMap<ObjectKey, Terraform>>,
    repositories: Mutex<BTreeMap<ObjectKey, GitRepository>>,
    secrets: Mutex<BTreeMap<ObjectKey, Secret>>,
    writes: AtomicUsize,
    deletes: AtomicUsize,
    version: AtomicUsize,
    stall_reads: AtomicBool,
    stalled: AtomicUsize,
    release: Notify,
}

impl MemoryStore {
    /// Creates and updates issued so far
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Deletes issued so far
    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn insert_terraform(&self, mut tf: Terraform) {
        tf.metadata.resource_version = Some(self.next_version());
        let key = ObjectKey::of(&tf).expect("fixture needs a namespace");
        self.terraforms.lock().unwrap().insert(key, tf);
    }

    pub fn insert_git_repository(&self, mut repo: GitRepository) {
        repo.metadata.resource_version = Some(self.next_version());
        let key = ObjectKey::of(&repo).expect("fixture needs a namespace");
        self.repositories.lock().unwrap().insert(key, repo);
    }

    pub fn insert_secret(&self, secret: Secret) {
        let key = ObjectKey::of(&secret).expect("fixture needs a namespace");
        self.secrets.lock().unwrap().insert(key, secret);
    }

    pub fn terraform(&self, key: &ObjectKey) -> Option<Terraform> {
        self.terraforms.lock().unwrap().get(key).cloned()
    }

    pub fn git_repository(&self, key: &ObjectKey) -> Option<GitRepository> {
        self.repositories.lock().unwrap().get(key).cloned()
    }

    /// Make every get block until [`MemoryStore::release_reads`]
    pub fn stall_reads(&self) {
        self.stall_reads.store(true, Ordering::SeqCst);
    }

    pub fn release_reads(&self) {
        self.stall_reads.store(false, Ordering::SeqCst);
        self.release.notify_waiters();
    }

    /// Gets that have blocked on [`MemoryStore::stall_reads`] so far
    pub fn stalled_reads(&self) -> usize {
        self.stalled.load(Ordering::SeqCst)
    }

    async fn wait_if_stalled(&self) {
        if self.stall_reads.load(Ordering::SeqCst) {
            let released = self.release.notified();
            self.stalled.fetch_add(1, Ordering::SeqCst);
            released.await;
        }
    }

    fn next_version(&self) -> String {
        (self.version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    fn get_in<K: Clone>(
        map: &Mutex<BTreeMap<ObjectKey, K>>,
        kind: &str,
        key: &ObjectKey,
    ) -> Result<K, Error> {
        map.lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::not_found(kind, key))
    }

    fn list_in<K: Resource + Clone>(
        map: &Mutex<BTreeMap<ObjectKey, K>>,
        namespace: &str,
        selector: &LabelSet,
    ) -> Vec<K> {
        map.lock()
            .unwrap()
            .iter()
            .filter(|(key, _)| key.namespace == namespace)
            .filter(|(_, obj)| {
                selector
                    .iter()
                    .all(|(k, v)| obj.labels().get(k) == Some(v))
            })
            .map(|(_, obj)| obj.clone())
            .collect()
    }

    fn create_in<K: Resource + Clone>(
        &self,
        map: &Mutex<BTreeMap<ObjectKey, K>>,
        kind: &str,
        obj: &K,
    ) -> Result<K, Error> {
        let key = ObjectKey::of(obj).expect("object needs a namespace");
        let mut map = map.lock().unwrap();
        if map.contains_key(&key) {
            return Err(Error::conflict(kind, &key, "already exists"));
        }
        let mut stored = obj.clone();
        stored.meta_mut().resource_version = Some(self.next_version());
        map.insert(key, stored.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(stored)
    }

    fn update_in<K: Resource + Clone>(
        &self,
        map: &Mutex<BTreeMap<ObjectKey, K>>,
        kind: &str,
        obj: &K,
    ) -> Result<K, Error> {
        let key = ObjectKey::of(obj).expect("object needs a namespace");
        let mut map = map.lock().unwrap();
        let current = map.get(&key).ok_or_else(|| Error::not_found(kind, &key))?;
        if current.meta().resource_version != obj.meta().resource_version {
            return Err(Error::conflict(kind, &key, "the object has been modified"));
        }
        let mut stored = obj.clone();
        stored.meta_mut().resource_version = Some(self.next_version());
        map.insert(key, stored.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(stored)
    }

    fn delete_in<K>(
        &self,
        map: &Mutex<BTreeMap<ObjectKey, K>>,
        kind: &str,
        key: &ObjectKey,
    ) -> Result<(), Error> {
        map.lock()
            .unwrap()
            .remove(key)
            .ok_or_else(|| Error::not_found(kind, key))?;
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl PlannerKubeClient for MemoryStore {
    async fn get_terraform(&self, key: &ObjectKey) -> Result<Terraform, Error> {
        self.wait_if_stalled().await;
        Self::get_in(&self.terraforms, "Terraform", key)
    }

    async fn list_terraforms(
        &self,
        namespace: &str,
        selector: &LabelSet,
    ) -> Result<Vec<Terraform>, Error> {
        Ok(Self::list_in(&self.terraforms, namespace, selector))
    }

    async fn create_terraform(&self, tf: &Terraform) -> Result<Terraform, Error> {
        self.create_in(&self.terraforms, "Terraform", tf)
    }

    async fn update_terraform(&self, tf: &Terraform) -> Result<Terraform, Error> {
        self.update_in(&self.terraforms, "Terraform", tf)
    }

    async fn delete_terraform(&self, key: &ObjectKey) -> Result<(), Error> {
        self.delete_in(&self.terraforms, "Terraform", key)
    }

    async fn get_git_repository(&self, key: &ObjectKey) -> Result<GitRepository, Error> {
        self.wait_if_stalled().await;
        Self::get_in(&self.repositories, "GitRepository", key)
    }

    async fn list_git_repositories(
        &self,
        namespace: &str,
        selector: &LabelSet,
    ) -> Result<Vec<GitRepository>, Error> {
        Ok(Self::list_in(&self.repositories, namespace, selector))
    }

    async fn create_git_repository(&self, repo: &GitRepository) -> Result<GitRepository, Error> {
        self.create_in(&self.repositories, "GitRepository", repo)
    }

    async fn update_git_repository(&self, repo: &GitRepository) -> Result<GitRepository, Error> {
        self.update_in(&self.repositories, "GitRepository", repo)
    }

    async fn delete_git_repository(&self, key: &ObjectKey) -> Result<(), Error> {
        self.delete_in(&self.repositories, "GitRepository", key)
    }

    async fn get_secret(&self, key: &ObjectKey) -> Result<Secret, Error> {
        self.wait_if_stalled().await;
        Self::get_in(&self.secrets, "Secret", key)
    }
}

// =============================================================================
// Fixtures
// =============================================================================

fn meta(namespace: &str, name: &str) -> ObjectMeta {
    let mut labels = BTreeMap::new();
    labels.insert("app".to_string(), name.to_string());
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        labels: Some(labels),
        ..Default::default()
    }
}

/// Primary GitRepository tracking `main` with credentials
pub fn git_repository(namespace: &str, name: &str) -> GitRepository {
    let mut extra = BTreeMap::new();
    extra.insert(
        "ignore".to_string(),
        serde_json::Value::String("/docs".to_string()),
    );
    GitRepository {
        metadata: meta(namespace, name),
        spec: GitRepositorySpec {
            url: format!("https://github.com/example/{name}"),
            secret_ref: Some(LocalObjectReference {
                name: format!("{name}-git-auth"),
            }),
            interval: "1m0s".to_string(),
            timeout: Some("60s".to_string()),
            reference: Some(GitRepositoryRef {
                branch: Some("main".to_string()),
                ..Default::default()
            }),
            suspend: false,
            extra,
        },
        status: None,
    }
}

/// Primary Terraform that auto-approves, forces and writes outputs to a Secret
pub fn terraform(namespace: &str, name: &str, source: &str) -> Terraform {
    let mut extra = BTreeMap::new();
    extra.insert(
        "vars".to_string(),
        serde_json::json!([{ "name": "region", "value": "eu-west-1" }]),
    );
    Terraform {
        metadata: meta(namespace, name),
        spec: TerraformSpec {
            source_ref: CrossNamespaceSourceReference {
                api_version: None,
                kind: "GitRepository".to_string(),
                name: source.to_string(),
                namespace: None,
            },
            path: Some("./infra".to_string()),
            interval: Some("1m".to_string()),
            plan_only: false,
            store_readable_plan: String::new(),
            write_outputs_to_secret: Some(WriteOutputsToSecretSpec {
                name: format!("{name}-outputs"),
                ..Default::default()
            }),
            approve_plan: "auto".to_string(),
            force: true,
            extra,
        },
        status: None,
    }
}
