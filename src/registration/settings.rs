// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Resolution of the externally reachable Rancher server URL.

use crate::error::{RegistrationError, Result};
use crate::types::Setting;
use futures::{channel::mpsc, future, Future, StreamExt};
use kube::{Api, Client};
use kube_runtime::{
    reflector::{self, ObjectRef, Store},
    watcher, WatchStreamExt,
};
use tracing::{debug, error, info, warn};
use url::Url;

/// Read access to Rancher settings by name
pub trait SettingsSource: Send + Sync {
    /// Value of the named setting, `None` when the setting does not exist
    fn value(&self, name: &str) -> Option<String>;
}

impl SettingsSource for Store<Setting> {
    fn value(&self, name: &str) -> Option<String> {
        self.get(&ObjectRef::new(name)).map(|s| s.value.clone())
    }
}

/// Resolve the base URL registrations are served under.
///
/// Reads through the cache on every call so a changed setting is picked up
/// by the next reconciliation.
pub fn resolve_base_url(settings: &dyn SettingsSource, setting_name: &str) -> Result<String> {
    let Some(value) = settings.value(setting_name) else {
        error!("Error getting {} setting: not found", setting_name);
        return Err(RegistrationError::Configuration(format!(
            "{} setting not found",
            setting_name
        )));
    };

    if value.is_empty() {
        error!("{} is not set", setting_name);
        return Err(RegistrationError::Configuration(format!(
            "{} is not set",
            setting_name
        )));
    }

    match Url::parse(&value) {
        Ok(url) if !url.cannot_be_a_base() => Ok(value),
        Ok(_) => Err(RegistrationError::Configuration(format!(
            "{} {:?} is not a base URL",
            setting_name, value
        ))),
        Err(e) => Err(RegistrationError::Configuration(format!(
            "{} {:?} is not a valid URL: {}",
            setting_name, value, e
        ))),
    }
}

/// Notifies when the watched setting's value differs from the last one seen.
///
/// Notifications coalesce: while one is pending, further changes are
/// absorbed by it.
pub struct SettingChanges {
    last: Option<String>,
    notify: mpsc::Sender<()>,
}

impl SettingChanges {
    pub fn new(notify: mpsc::Sender<()>) -> Self {
        Self { last: None, notify }
    }

    pub fn observe(&mut self, setting: &Setting) {
        if self.last.as_deref() == Some(setting.value.as_str()) {
            return;
        }
        info!("Setting {:?} is now {:?}", setting.metadata.name, setting.value);
        self.last = Some(setting.value.clone());

        if let Err(e) = self.notify.try_send(()) {
            if e.is_disconnected() {
                debug!("No listener for setting changes");
            }
        }
    }
}

/// Build a settings cache for a single named setting.
///
/// The returned future drives the watch and must be spawned; the store is
/// usable once `wait_until_ready` resolves. The receiver yields once per
/// observed change of the setting's value.
pub fn settings_reflector(
    client: Client,
    setting_name: &str,
) -> (
    Store<Setting>,
    mpsc::Receiver<()>,
    impl Future<Output = ()> + Send + 'static,
) {
    let (reader, writer) = reflector::store::<Setting>();
    let (notify, changed) = mpsc::channel(0);
    let mut changes = SettingChanges::new(notify);
    let settings: Api<Setting> = Api::all(client);
    let config = watcher::Config::default().fields(&format!("metadata.name={}", setting_name));

    let driver = reflector::reflector(writer, watcher(settings, config))
        .default_backoff()
        .applied_objects()
        .for_each(move |res| {
            match res {
                Ok(setting) => changes.observe(&setting),
                Err(e) => warn!("Settings watch error: {}", e),
            }
            future::ready(())
        });

    (reader, changed, driver)
}
