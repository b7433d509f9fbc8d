// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Derivation of a registration's status from the reconciliation outcome.

use crate::constants::REGISTRATION_PATH;
use crate::types::{MachineRegistration, MachineRegistrationStatus};
use k8s_openapi::api::core::v1::ObjectReference;
use kube::ResourceExt;

/// URL machines use to register: `{base_url}/elemental/registration/{token}`
pub fn registration_url(base_url: &str, token: &str) -> String {
    format!("{}/{}/{}", base_url, REGISTRATION_PATH, token)
}

pub fn service_account_ref(registration: &MachineRegistration) -> ObjectReference {
    ObjectReference {
        kind: Some("ServiceAccount".to_string()),
        namespace: registration.namespace(),
        name: Some(registration.name_any()),
        ..Default::default()
    }
}

/// Record the token (only when none is set yet) and re-derive the URL
pub fn project_token(
    mut status: MachineRegistrationStatus,
    base_url: &str,
    issued: Option<String>,
) -> MachineRegistrationStatus {
    if status.registration_token.is_empty() {
        if let Some(token) = issued {
            status.registration_token = token;
        }
    }
    status.registration_url = registration_url(base_url, &status.registration_token);
    status
}

/// Status after every dependent was confirmed to exist
pub fn project_ready(
    registration: &MachineRegistration,
    mut status: MachineRegistrationStatus,
) -> MachineRegistrationStatus {
    status.service_account_ref = Some(service_account_ref(registration));
    status.set_ready(None);
    status
}

/// Status after a failed reconciliation; everything derived so far is kept.
///
/// A registration that already reached Ready keeps its condition, the
/// failure is only reported through the log and a Warning event.
pub fn project_failure(
    mut status: MachineRegistrationStatus,
    error: &str,
) -> MachineRegistrationStatus {
    if !status.is_ready() {
        status.set_ready(Some(error));
    }
    status
}
