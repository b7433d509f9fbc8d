// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::TOKEN_SECRET_SUFFIX;
use crate::error::Result;
use crate::kubernetes::{ObjectStore, RegistrationStore};
use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use tracing::{debug, info, instrument};

/// Delete a registration's dependents: RoleBinding, Role, ServiceAccount,
/// then the token Secret. Missing objects count as deleted.
#[instrument(skip(store))]
pub async fn teardown<S>(store: &S, namespace: &str, name: &str) -> Result<()>
where
    S: RegistrationStore + ?Sized,
{
    delete_ignore_missing::<RoleBinding, S>(store, namespace, name).await?;
    delete_ignore_missing::<Role, S>(store, namespace, name).await?;
    delete_ignore_missing::<ServiceAccount, S>(store, namespace, name).await?;
    // The token controller only cascades Secrets carrying the SA UID, which we never set
    let secret_name = format!("{}{}", name, TOKEN_SECRET_SUFFIX);
    delete_ignore_missing::<Secret, S>(store, namespace, &secret_name).await?;

    info!("Removed dependents of MachineRegistration {}/{}", namespace, name);
    Ok(())
}

async fn delete_ignore_missing<K, S>(store: &S, namespace: &str, name: &str) -> Result<()>
where
    K: Send + Sync + 'static,
    S: ObjectStore<K> + ?Sized,
{
    match store.delete(namespace, name).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_not_found() => {
            debug!("{}", e);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
