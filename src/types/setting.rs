// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Rancher `Setting` (management.cattle.io/v3).
//!
//! Settings keep their payload at the top level instead of under a spec,
//! so the resource is declared by hand rather than through `CustomResource`.

use kube::api::ObjectMeta;
use kube::core::ClusterResourceScope;
use kube::Resource;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Setting {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub default: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Resource for Setting {
    type DynamicType = ();
    type Scope = ClusterResourceScope;

    fn kind(_: &()) -> Cow<'_, str> {
        "Setting".into()
    }

    fn group(_: &()) -> Cow<'_, str> {
        "management.cattle.io".into()
    }

    fn version(_: &()) -> Cow<'_, str> {
        "v3".into()
    }

    fn plural(_: &()) -> Cow<'_, str> {
        "settings".into()
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
