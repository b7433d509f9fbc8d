// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! CRUD access to the namespaced resources a registration depends on.
//!
//! The provisioner and teardown only talk to [`ObjectStore`]; [`KubeStore`]
//! backs it with the Kubernetes API and classifies failures into
//! [`StoreError`] so callers can tolerate NotFound/AlreadyExists.

use crate::error::StoreError;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use kube::{
    api::{DeleteParams, PostParams},
    core::NamespaceResourceScope,
    Api, Client, Resource, ResourceExt,
};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;
use tracing::{debug, instrument};

/// Get/Create/Update/Delete by namespaced name for one resource kind
#[async_trait]
pub trait ObjectStore<K>: Send + Sync
where
    K: Send + Sync + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<K, StoreError>;

    /// Create `obj` in the namespace set on its metadata
    async fn create(&self, obj: &K) -> Result<K, StoreError>;

    /// Replace an existing object
    async fn update(&self, obj: &K) -> Result<K, StoreError>;

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError>;
}

/// Every kind the registration handler provisions
pub trait RegistrationStore:
    ObjectStore<Role> + ObjectStore<ServiceAccount> + ObjectStore<Secret> + ObjectStore<RoleBinding>
{
}

impl<T> RegistrationStore for T where
    T: ObjectStore<Role>
        + ObjectStore<ServiceAccount>
        + ObjectStore<Secret>
        + ObjectStore<RoleBinding>
{
}

/// [`ObjectStore`] backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    field_manager: String,
}

impl KubeStore {
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    fn post_params(&self) -> PostParams {
        PostParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        }
    }
}

fn kind_of<K: Resource<DynamicType = ()>>() -> String {
    K::kind(&()).into_owned()
}

#[async_trait]
impl<K> ObjectStore<K> for KubeStore
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    #[instrument(skip(self), fields(kind = %kind_of::<K>()))]
    async fn get(&self, namespace: &str, name: &str) -> Result<K, StoreError> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.get(name)
            .await
            .map_err(|e| StoreError::from_kube(&kind_of::<K>(), name, e))
    }

    #[instrument(skip(self, obj), fields(kind = %kind_of::<K>(), name = %obj.name_any()))]
    async fn create(&self, obj: &K) -> Result<K, StoreError> {
        let name = obj.name_any();
        let namespace = obj.namespace().unwrap_or_default();
        let api: Api<K> = Api::namespaced(self.client.clone(), &namespace);

        let created = api
            .create(&self.post_params(), obj)
            .await
            .map_err(|e| StoreError::from_kube(&kind_of::<K>(), &name, e))?;
        debug!("Created {} {}/{}", kind_of::<K>(), namespace, name);
        Ok(created)
    }

    #[instrument(skip(self, obj), fields(kind = %kind_of::<K>(), name = %obj.name_any()))]
    async fn update(&self, obj: &K) -> Result<K, StoreError> {
        let name = obj.name_any();
        let namespace = obj.namespace().unwrap_or_default();
        let api: Api<K> = Api::namespaced(self.client.clone(), &namespace);

        api.replace(&name, &self.post_params(), obj)
            .await
            .map_err(|e| StoreError::from_kube(&kind_of::<K>(), &name, e))
    }

    #[instrument(skip(self), fields(kind = %kind_of::<K>()))]
    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| StoreError::from_kube(&kind_of::<K>(), name, e))
    }
}
