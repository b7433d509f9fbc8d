// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! OnChange / OnRemove entry points for `MachineRegistration` objects.

use crate::constants::SERVER_URL_SETTING;
use crate::error::{RegistrationError, Result};
use crate::events::{actions, reasons, EventPublisher};
use crate::kubernetes::RegistrationStore;
use crate::registration::provisioner::provision;
use crate::registration::settings::{resolve_base_url, SettingsSource};
use crate::registration::status::{project_failure, project_ready, project_token};
use crate::registration::teardown::teardown;
use crate::registration::token::{RandomTokenIssuer, TokenIssuer};
use crate::types::{MachineRegistration, MachineRegistrationStatus};
use kube_runtime::events::EventType;
use kube::{Resource, ResourceExt};
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Result of one OnChange invocation.
///
/// `status` is returned even when `result` is an error: it carries whatever
/// was derived before the failing step and is safe to persist.
/// `token_issued` is set when `status` holds a token that has not been
/// persisted yet; call [`RegistrationHandler::token_persisted`] once it is.
#[derive(Debug)]
pub struct ChangeOutcome {
    pub status: MachineRegistrationStatus,
    pub result: Result<()>,
    pub token_issued: bool,
}

pub struct RegistrationHandler<S> {
    store: S,
    settings: Arc<dyn SettingsSource>,
    tokens: Arc<dyn TokenIssuer>,
    events: Arc<dyn EventPublisher>,
    server_url_setting: String,
}

impl<S> RegistrationHandler<S>
where
    S: RegistrationStore,
{
    pub fn new(store: S, settings: Arc<dyn SettingsSource>, events: Arc<dyn EventPublisher>) -> Self {
        Self {
            store,
            settings,
            tokens: Arc::new(RandomTokenIssuer),
            events,
            server_url_setting: SERVER_URL_SETTING.to_string(),
        }
    }

    pub fn with_token_issuer(mut self, tokens: Arc<dyn TokenIssuer>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn with_server_url_setting(mut self, name: impl Into<String>) -> Self {
        self.server_url_setting = name.into();
        self
    }

    /// Converge the registration's dependents and derive its new status
    #[instrument(
        skip_all,
        fields(registration = %format!("{}/{}", registration.namespace().unwrap_or_default(), registration.name_any()))
    )]
    pub async fn on_change(
        &self,
        registration: &MachineRegistration,
        status: MachineRegistrationStatus,
    ) -> ChangeOutcome {
        let base_url = match resolve_base_url(self.settings.as_ref(), &self.server_url_setting) {
            Ok(url) => url,
            Err(e) => return self.fail(registration, status, e).await,
        };

        let mut issued = None;
        if status.registration_token.is_empty() {
            match self.tokens.issue() {
                Ok(token) => issued = Some(token),
                Err(e) => return self.fail(registration, status, e).await,
            }
        }
        let token_issued = issued.is_some();
        let status = project_token(status, &base_url, issued);

        if let Err(e) = provision(&self.store, registration).await {
            let mut outcome = self.fail(registration, status, e).await;
            outcome.token_issued = token_issued;
            return outcome;
        }

        ChangeOutcome {
            status: project_ready(registration, status),
            result: Ok(()),
            token_issued,
        }
    }

    /// Announce a newly issued token once the status carrying it is stored
    pub async fn token_persisted(&self, registration: &MachineRegistration) {
        info!(
            "Got new MachineRegistration '{}': generated registration token",
            registration.name_any()
        );
        self.events
            .publish(
                &registration.object_ref(&()),
                EventType::Normal,
                reasons::TOKEN_ISSUED,
                actions::ISSUE_TOKEN,
                Some("Generated registration token".to_string()),
            )
            .await;
    }

    /// Remove the registration's dependents
    #[instrument(
        skip_all,
        fields(registration = %format!("{}/{}", registration.namespace().unwrap_or_default(), registration.name_any()))
    )]
    pub async fn on_remove(&self, registration: &MachineRegistration) -> Result<()> {
        let namespace = registration.namespace().unwrap_or_default();
        let result = teardown(&self.store, &namespace, &registration.name_any()).await;

        if let Err(e) = &result {
            error!("Teardown failed: {}", e);
            self.events
                .publish(
                    &registration.object_ref(&()),
                    EventType::Warning,
                    reasons::TEARDOWN_FAILED,
                    actions::TEARDOWN,
                    Some(e.to_string()),
                )
                .await;
        }
        result
    }

    async fn fail(
        &self,
        registration: &MachineRegistration,
        status: MachineRegistrationStatus,
        error: RegistrationError,
    ) -> ChangeOutcome {
        error!("Reconciliation failed: {}", error);
        self.events
            .publish(
                &registration.object_ref(&()),
                EventType::Warning,
                reasons::RECONCILE_FAILED,
                actions::RECONCILE,
                Some(error.to_string()),
            )
            .await;

        ChangeOutcome {
            status: project_failure(status, &error.to_string()),
            result: Err(error),
            token_issued: false,
        }
    }
}
