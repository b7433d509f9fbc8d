// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Provisioning of the RBAC objects a registration hands out to machines.
//!
//! Every step is create-or-ignore, so re-running the whole sequence after
//! a partial failure converges without cleanup. Existing objects are never
//! diffed: the first write wins.

use crate::constants::{annotations, labels, SERVICE_ACCOUNT_TOKEN_TYPE};
use crate::error::{RegistrationError, Result, StoreError};
use crate::kubernetes::{ObjectStore, RegistrationStore};
use crate::types::MachineRegistration;
use k8s_openapi::api::core::v1::{ObjectReference, Secret, ServiceAccount};
use k8s_openapi::api::rbac::v1::{PolicyRule, Role, RoleBinding, RoleRef, Subject};
use kube::{api::ObjectMeta, Resource, ResourceExt};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

/// Ensure Role, ServiceAccount, token Secret and RoleBinding exist, in that order
#[instrument(
    skip(store, registration),
    fields(registration = %format!("{}/{}", registration.namespace().unwrap_or_default(), registration.name_any()))
)]
pub async fn provision<S>(store: &S, registration: &MachineRegistration) -> Result<()>
where
    S: RegistrationStore + ?Sized,
{
    ensure_role(store, registration).await?;
    ensure_service_account(store, registration).await?;
    ensure_credential(store, registration).await?;
    ensure_role_binding(store, registration).await?;
    Ok(())
}

/// Create `obj`, reporting whether it was created (`false` if it already existed)
async fn create_or_ignore<K, S>(store: &S, obj: &K) -> std::result::Result<bool, StoreError>
where
    K: Send + Sync + 'static,
    S: ObjectStore<K> + ?Sized,
{
    match store.create(obj).await {
        Ok(_) => Ok(true),
        Err(e) if e.is_already_exists() => Ok(false),
        Err(e) => Err(e),
    }
}

async fn ensure_role<S>(store: &S, registration: &MachineRegistration) -> Result<()>
where
    S: RegistrationStore + ?Sized,
{
    if create_or_ignore(store, &desired_role(registration)).await? {
        debug!("Created Role {}", registration.name_any());
    }
    Ok(())
}

async fn ensure_service_account<S>(store: &S, registration: &MachineRegistration) -> Result<()>
where
    S: RegistrationStore + ?Sized,
{
    let name = registration.name_any();
    let namespace = registration.namespace().unwrap_or_default();

    if create_or_ignore(store, &desired_service_account(registration)).await? {
        debug!("Created ServiceAccount {}", name);
        return Ok(());
    }

    // Ensure the ServiceAccount is linked to a Secret
    let existing = match ObjectStore::<ServiceAccount>::get(store, &namespace, &name).await {
        Ok(sa) => sa,
        Err(e) => {
            warn!("Skip checks on '{}' ServiceAccount: {}", name, e);
            return Ok(());
        }
    };

    if existing.secrets.as_ref().is_some_and(|s| !s.is_empty()) {
        return Ok(());
    }

    let mut repaired = existing;
    repaired.secrets = Some(vec![secret_reference(registration)]);
    ObjectStore::<ServiceAccount>::update(store, &repaired)
        .await
        .map_err(|source| RegistrationError::ServiceAccountUpdate {
            name: name.clone(),
            source,
        })?;
    info!("'{}' ServiceAccount: updated Secret link", name);
    Ok(())
}

async fn ensure_credential<S>(store: &S, registration: &MachineRegistration) -> Result<()>
where
    S: RegistrationStore + ?Sized,
{
    let created = create_or_ignore(store, &desired_secret(registration))
        .await
        .map_err(|source| RegistrationError::CredentialCreate {
            name: registration.name_any(),
            source,
        })?;
    if created {
        debug!("Created Secret {}", registration.token_secret_name());
    }
    Ok(())
}

async fn ensure_role_binding<S>(store: &S, registration: &MachineRegistration) -> Result<()>
where
    S: RegistrationStore + ?Sized,
{
    if create_or_ignore(store, &desired_role_binding(registration)).await? {
        debug!("Created RoleBinding {}", registration.name_any());
    }
    Ok(())
}

/// Metadata shared by every dependent: managed label and a controller owner reference
fn managed_metadata(registration: &MachineRegistration, name: String) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: registration.namespace(),
        labels: Some(BTreeMap::from([(
            labels::MANAGED.to_string(),
            "true".to_string(),
        )])),
        owner_references: registration.controller_owner_ref(&()).map(|r| vec![r]),
        ..Default::default()
    }
}

fn secret_reference(registration: &MachineRegistration) -> ObjectReference {
    ObjectReference {
        name: Some(registration.token_secret_name()),
        ..Default::default()
    }
}

pub(crate) fn desired_role(registration: &MachineRegistration) -> Role {
    Role {
        metadata: managed_metadata(registration, registration.name_any()),
        rules: Some(vec![
            PolicyRule {
                api_groups: Some(vec![String::new()]),
                verbs: ["get", "watch", "list", "update", "patch"]
                    .map(String::from)
                    .to_vec(),
                resources: Some(vec!["secrets".to_string()]),
                ..Default::default()
            },
            PolicyRule {
                api_groups: Some(vec!["management.cattle.io".to_string()]),
                verbs: ["get", "watch", "list"].map(String::from).to_vec(),
                resources: Some(vec!["settings".to_string()]),
                ..Default::default()
            },
        ]),
    }
}

pub(crate) fn desired_service_account(registration: &MachineRegistration) -> ServiceAccount {
    ServiceAccount {
        metadata: managed_metadata(registration, registration.name_any()),
        secrets: Some(vec![secret_reference(registration)]),
        ..Default::default()
    }
}

pub(crate) fn desired_secret(registration: &MachineRegistration) -> Secret {
    let mut metadata = managed_metadata(registration, registration.token_secret_name());
    metadata.annotations = Some(BTreeMap::from([(
        annotations::SERVICE_ACCOUNT_NAME.to_string(),
        registration.name_any(),
    )]));

    Secret {
        metadata,
        type_: Some(SERVICE_ACCOUNT_TOKEN_TYPE.to_string()),
        ..Default::default()
    }
}

pub(crate) fn desired_role_binding(registration: &MachineRegistration) -> RoleBinding {
    RoleBinding {
        metadata: managed_metadata(registration, registration.name_any()),
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: registration.name_any(),
            namespace: registration.namespace(),
            ..Default::default()
        }]),
        role_ref: RoleRef {
            kind: "Role".to_string(),
            name: registration.name_any(),
            api_group: "rbac.authorization.k8s.io".to_string(),
        },
    }
}
