// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes utilities for CRD discovery and object store access.

pub mod crd;
pub mod store;

pub use crd::wait_for_crd;
pub use store::{KubeStore, ObjectStore, RegistrationStore};
