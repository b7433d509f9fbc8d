// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! MachineRegistration reconciler - drives the registration handler from
//! watch events and persists the derived status.

use crate::config::Config;
use crate::constants::{labels, requeue, FINALIZER};
use crate::error::{RegistrationError, Result};
use crate::events::KubeEventPublisher;
use crate::kubernetes::{KubeStore, RegistrationStore};
use crate::registration::{RegistrationHandler, SettingsSource};
use crate::types::MachineRegistration;
use futures::{Stream, StreamExt};
use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use kube::{
    api::{Patch, PatchParams},
    core::NamespaceResourceScope,
    Api, Client, Resource, ResourceExt,
};
use kube_runtime::{
    controller::Action,
    finalizer::{finalizer, Event as FinalizerEvent},
    watcher, Controller,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub struct RegistrationReconciler {
    client: Client,
    config: Config,
    handler: RegistrationHandler<KubeStore>,
}

impl RegistrationReconciler {
    pub fn new(client: Client, config: Config, settings: Arc<dyn SettingsSource>) -> Self {
        let store = KubeStore::new(client.clone(), config.controller_name.clone());
        let events = Arc::new(KubeEventPublisher::new(
            client.clone(),
            &config.controller_name,
        ));
        let handler = RegistrationHandler::new(store, settings, events)
            .with_server_url_setting(config.server_url_setting.clone());

        Self {
            client,
            config,
            handler,
        }
    }

    /// Run until a shutdown signal arrives.
    ///
    /// Every registration is reconciled again whenever `setting_changes`
    /// yields, so URLs follow the server URL setting.
    pub async fn run(
        self,
        setting_changes: impl Stream<Item = ()> + Send + Sync + 'static,
    ) -> anyhow::Result<()> {
        let namespace = self.config.watch_namespace.clone();
        let registrations: Api<MachineRegistration> =
            scoped_api(self.client.clone(), namespace.as_deref());
        let managed = watcher::Config::default().labels(&format!("{}=true", labels::MANAGED));

        info!(
            "Watching MachineRegistrations in {}",
            namespace.as_deref().unwrap_or("all namespaces")
        );

        let owned_roles: Api<Role> = scoped_api(self.client.clone(), namespace.as_deref());
        let owned_accounts: Api<ServiceAccount> =
            scoped_api(self.client.clone(), namespace.as_deref());
        let owned_bindings: Api<RoleBinding> =
            scoped_api(self.client.clone(), namespace.as_deref());
        let context = Arc::new(self);

        Controller::new(registrations, watcher::Config::default())
            .owns(owned_roles, managed.clone())
            .owns(owned_accounts, managed.clone())
            .owns(owned_bindings, managed)
            .reconcile_all_on(setting_changes)
            .shutdown_on_signal()
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled registration: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        info!("Registration controller stopped");
        Ok(())
    }
}

fn scoped_api<K>(client: Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()> + Clone + DeserializeOwned + Debug,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}

async fn reconcile(
    registration: Arc<MachineRegistration>,
    ctx: Arc<RegistrationReconciler>,
) -> Result<Action> {
    let namespace = registration.namespace().unwrap_or_default();
    let api: Api<MachineRegistration> = Api::namespaced(ctx.client.clone(), &namespace);

    finalizer(&api, FINALIZER, registration, |event| async {
        match event {
            FinalizerEvent::Apply(registration) => apply(&registration, &api, &ctx.handler).await,
            FinalizerEvent::Cleanup(registration) => {
                ctx.handler.on_remove(&registration).await?;
                Ok(Action::await_change())
            }
        }
    })
    .await
    .map_err(|e| RegistrationError::Finalizer(Box::new(e)))
}

/// Run OnChange and persist whatever status it derived, failed or not
async fn apply<S: RegistrationStore>(
    registration: &MachineRegistration,
    api: &Api<MachineRegistration>,
    handler: &RegistrationHandler<S>,
) -> Result<Action> {
    let prior = registration.status.clone().unwrap_or_default();
    let outcome = handler.on_change(registration, prior.clone()).await;

    if outcome.status != prior {
        debug!("Updating status of {}", registration.name_any());
        let patch = json!({ "status": outcome.status });
        api.patch_status(
            &registration.name_any(),
            &PatchParams::default(),
            &Patch::Merge(&patch),
        )
        .await?;
    }

    if outcome.token_issued {
        handler.token_persisted(registration).await;
    }

    outcome.result.map(|_| Action::await_change())
}

fn error_policy(
    _registration: Arc<MachineRegistration>,
    error: &RegistrationError,
    _ctx: Arc<RegistrationReconciler>,
) -> Action {
    error!("Reconciliation error: {}", error);
    Action::requeue(requeue_after(error))
}

fn requeue_after(error: &RegistrationError) -> Duration {
    if error.is_configuration() {
        Duration::from_secs(requeue::CONFIGURATION_SECS)
    } else {
        Duration::from_secs(requeue::DEFAULT_SECS)
    }
}
