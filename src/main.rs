// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use kube::Client;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use machine_registration::config::Config;
use machine_registration::kubernetes::wait_for_crd;
use machine_registration::reconcilers::RegistrationReconciler;
use machine_registration::registration::settings_reflector;
use machine_registration::types::{MachineRegistration, Setting};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting machine registration controller");

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Configuration loaded: watch_namespace={:?}, server_url_setting={}",
        config.watch_namespace, config.server_url_setting
    );

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    // Both CRDs must be served before watches can start
    wait_for_crd::<MachineRegistration>(&client).await?;
    wait_for_crd::<Setting>(&client).await?;

    let (settings, setting_changes, settings_watch) =
        settings_reflector(client.clone(), &config.server_url_setting);
    tokio::spawn(settings_watch);
    settings
        .wait_until_ready()
        .await
        .context("settings cache stopped before its initial sync")?;
    info!("Settings cache synced");

    RegistrationReconciler::new(client, config, Arc::new(settings))
        .run(setting_changes)
        .await
}
