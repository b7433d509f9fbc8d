// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Registration lifecycle: token issuance, dependent provisioning, status
//! derivation and teardown.

pub mod handler;
pub mod provisioner;
pub mod settings;
pub mod status;
pub mod teardown;
pub mod token;

pub use handler::{ChangeOutcome, RegistrationHandler};
pub use settings::{resolve_base_url, settings_reflector, SettingChanges, SettingsSource};
pub use token::{RandomTokenIssuer, TokenIssuer};
