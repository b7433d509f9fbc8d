// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Resource types watched by the registration controller.

pub mod registration;
pub mod setting;

pub use registration::{
    Condition, MachineRegistration, MachineRegistrationSpec, MachineRegistrationStatus,
    RegistrationPhase,
};
pub use setting::Setting;
