// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::{conditions, TOKEN_SECRET_SUFFIX};
use k8s_openapi::api::core::v1::ObjectReference;
use kube::{CustomResource, ResourceExt};
use schemars::schema::{InstanceType, Schema, SchemaObject};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[kube(group = "elemental.cattle.io", version = "v1beta1", kind = "MachineRegistration")]
#[kube(namespaced)]
#[kube(status = "MachineRegistrationStatus")]
#[kube(printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#)]
#[serde(rename_all = "camelCase")]
pub struct MachineRegistrationSpec {
    /// Template for the name of machines registering through this object
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_name: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub machine_inventory_labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub machine_inventory_annotations: BTreeMap<String, String>,
    /// Free-form installation config handed to registering machines
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub config: Option<serde_json::Value>,
}

fn preserve_unknown_fields(_: &mut schemars::gen::SchemaGenerator) -> Schema {
    SchemaObject {
        instance_type: Some(InstanceType::Object.into()),
        extensions: [(
            "x-kubernetes-preserve-unknown-fields".to_string(),
            serde_json::Value::Bool(true),
        )]
        .into_iter()
        .collect(),
        ..Default::default()
    }
    .into()
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MachineRegistrationStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(rename = "registrationURL", default, skip_serializing_if = "String::is_empty")]
    pub registration_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub registration_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account_ref: Option<ObjectReference>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Provisioning phase as observed through a registration's status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationPhase {
    /// No token issued yet
    Unprovisioned,
    /// Token assigned, dependents not yet confirmed
    Provisioning,
    /// All dependents exist and the Ready condition is True
    Ready,
}

impl MachineRegistration {
    /// Name of the bearer-token Secret bound to this registration's ServiceAccount
    pub fn token_secret_name(&self) -> String {
        format!("{}{}", self.name_any(), TOKEN_SECRET_SUFFIX)
    }

    pub fn phase(&self) -> RegistrationPhase {
        self.status
            .as_ref()
            .map(MachineRegistrationStatus::phase)
            .unwrap_or(RegistrationPhase::Unprovisioned)
    }
}

impl MachineRegistrationStatus {
    pub fn phase(&self) -> RegistrationPhase {
        if self.registration_token.is_empty() {
            RegistrationPhase::Unprovisioned
        } else if self.is_ready() {
            RegistrationPhase::Ready
        } else {
            RegistrationPhase::Provisioning
        }
    }

    pub fn ready_condition(&self) -> Option<&Condition> {
        self.conditions
            .iter()
            .find(|c| c.condition_type == conditions::READY)
    }

    pub fn is_ready(&self) -> bool {
        self.ready_condition().is_some_and(|c| c.status == "True")
    }

    /// Mark the registration Ready, or not Ready with the failure as message
    pub fn set_ready(&mut self, error: Option<&str>) {
        let condition = match error {
            None => Condition {
                condition_type: conditions::READY.to_string(),
                status: "True".to_string(),
                reason: Some(conditions::READY_REASON.to_string()),
                message: None,
            },
            Some(message) => Condition {
                condition_type: conditions::READY.to_string(),
                status: "False".to_string(),
                reason: Some(conditions::NOT_READY_REASON.to_string()),
                message: Some(message.to_string()),
            },
        };

        match self
            .conditions
            .iter_mut()
            .find(|c| c.condition_type == conditions::READY)
        {
            Some(existing) => *existing = condition,
            None => self.conditions.push(condition),
        }
    }
}
