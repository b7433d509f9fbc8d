// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Label keys stamped on every resource this controller creates
pub mod labels {
    /// Marks a resource as created and owned by the registration controller
    pub const MANAGED: &str = "elemental.cattle.io/managed";
}

/// Annotation keys used on dependent resources
pub mod annotations {
    /// Binds a token Secret to its ServiceAccount
    pub const SERVICE_ACCOUNT_NAME: &str = "kubernetes.io/service-account.name";
}

/// Default controller name, used as event reporter and field manager
pub const CONTROLLER_NAME: &str = "machine-registration";

/// Finalizer guarding teardown of a registration's dependents
pub const FINALIZER: &str = "elemental.cattle.io/machine-registration";

/// Rancher setting holding the externally reachable server URL
pub const SERVER_URL_SETTING: &str = "server-url";

/// Path inserted between the server URL and the registration token
pub const REGISTRATION_PATH: &str = "elemental/registration";

/// Suffix appended to the registration name to build the token Secret name
pub const TOKEN_SECRET_SUFFIX: &str = "-token";

/// Secret type for ServiceAccount bearer tokens
pub const SERVICE_ACCOUNT_TOKEN_TYPE: &str = "kubernetes.io/service-account-token";

/// Ready condition vocabulary
pub mod conditions {
    pub const READY: &str = "Ready";
    pub const READY_REASON: &str = "MachineRegistrationReady";
    pub const NOT_READY_REASON: &str = "MachineRegistrationNotReady";
}

/// Requeue delays after a failed reconciliation
pub mod requeue {
    /// Misconfiguration needs an admin, so retry slowly
    pub const CONFIGURATION_SECS: u64 = 60;
    pub const DEFAULT_SECS: u64 = 15;
}

/// CRD polling configuration
pub mod crd {
    /// Initial polling interval in seconds when waiting for CRD
    pub const POLL_INTERVAL_SECS: u64 = 10;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 60;
}
