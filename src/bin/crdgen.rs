// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Prints the MachineRegistration CRD as YAML.

use kube::CustomResourceExt;
use machine_registration::types::MachineRegistration;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&MachineRegistration::crd())?);
    Ok(())
}
