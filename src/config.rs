// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::{CONTROLLER_NAME, SERVER_URL_SETTING};
use anyhow::{bail, Result};
use std::env;

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Namespace to watch for MachineRegistrations, all namespaces when unset
    pub watch_namespace: Option<String>,
    /// Rancher setting holding the externally reachable server URL
    pub server_url_setting: String,
    /// Reported on events and used as field manager
    pub controller_name: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let watch_namespace = lookup("WATCH_NAMESPACE").filter(|ns| !ns.is_empty());
        let server_url_setting =
            lookup("SERVER_URL_SETTING").unwrap_or_else(|| SERVER_URL_SETTING.to_string());
        if server_url_setting.is_empty() {
            bail!("SERVER_URL_SETTING environment variable is empty");
        }
        let controller_name =
            lookup("CONTROLLER_NAME").unwrap_or_else(|| CONTROLLER_NAME.to_string());

        Ok(Config {
            watch_namespace,
            server_url_setting,
            controller_name,
        })
    }
}
