// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use kube_runtime::finalizer;
use thiserror::Error;

/// Classified failure of a single CRUD call against the object store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{kind} {name:?} not found")]
    NotFound { kind: String, name: String },

    #[error("{kind} {name:?} already exists")]
    AlreadyExists { kind: String, name: String },

    #[error("Kubernetes API error on {kind} {name:?}: {source}")]
    Kube {
        kind: String,
        name: String,
        #[source]
        source: kube::Error,
    },
}

impl StoreError {
    /// Classify a kube-rs error raised while operating on `kind`/`name`
    pub fn from_kube(kind: &str, name: &str, err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ref resp) if resp.code == 404 => StoreError::NotFound {
                kind: kind.to_string(),
                name: name.to_string(),
            },
            kube::Error::Api(ref resp) if resp.code == 409 && resp.reason == "AlreadyExists" => {
                StoreError::AlreadyExists {
                    kind: kind.to_string(),
                    name: name.to_string(),
                }
            }
            source => StoreError::Kube {
                kind: kind.to_string(),
                name: name.to_string(),
                source,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists { .. })
    }
}

#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to generate registration token: {0}")]
    Randomness(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("update {name} ServiceAccount: {source}")]
    ServiceAccountUpdate {
        name: String,
        #[source]
        source: StoreError,
    },

    #[error("add Secret to {name} ServiceAccount: {source}")]
    CredentialCreate {
        name: String,
        #[source]
        source: StoreError,
    },

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Finalizer error: {0}")]
    Finalizer(#[source] Box<finalizer::Error<RegistrationError>>),
}

impl RegistrationError {
    /// Whether retrying without operator intervention can succeed
    pub fn is_configuration(&self) -> bool {
        match self {
            RegistrationError::Configuration(_) => true,
            RegistrationError::Finalizer(inner) => matches!(
                inner.as_ref(),
                finalizer::Error::ApplyFailed(e) | finalizer::Error::CleanupFailed(e)
                    if e.is_configuration()
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistrationError>;
