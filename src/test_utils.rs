// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test doubles for the object store, settings, tokens, events and the
//! Kubernetes API.

use crate::error::{RegistrationError, StoreError};
use crate::events::EventPublisher;
use crate::kubernetes::ObjectStore;
use crate::registration::{SettingsSource, TokenIssuer};
use crate::types::{MachineRegistration, MachineRegistrationSpec};
use async_trait::async_trait;
use http::{Request, Response};
use k8s_openapi::api::core::v1::ObjectReference;
use kube::api::ObjectMeta;
use kube::client::Body;
use kube::core::ErrorResponse;
use kube_runtime::events::EventType;
use kube::{Client, Resource, ResourceExt};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

/// A registration with a UID, so owner references can be derived from it
pub fn make_registration(namespace: &str, name: &str) -> MachineRegistration {
    MachineRegistration {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(format!("uid-{}", name)),
            ..Default::default()
        },
        spec: MachineRegistrationSpec::default(),
        status: None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Create,
    Update,
    Delete,
}

impl Verb {
    fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::Create => "create",
            Verb::Update => "update",
            Verb::Delete => "delete",
        }
    }
}

type ObjectKey = (String, String, String);

#[derive(Default)]
struct MemoryState {
    objects: BTreeMap<ObjectKey, serde_json::Value>,
    failures: Vec<(Verb, String, String)>,
    calls: Vec<String>,
}

impl MemoryState {
    /// Record a mutating call and apply any injected failure for it
    fn enter(&mut self, verb: Verb, kind: &str, namespace: &str, name: &str) -> Result<(), StoreError> {
        if verb != Verb::Get {
            self.calls
                .push(format!("{} {} {}/{}", verb.as_str(), kind, namespace, name));
        }
        let injected = self
            .failures
            .iter()
            .any(|(v, k, n)| *v == verb && k == kind && n == name);
        if injected {
            return Err(StoreError::Kube {
                kind: kind.to_string(),
                name: name.to_string(),
                source: kube::Error::Api(ErrorResponse {
                    status: "Failure".to_string(),
                    message: "injected failure".to_string(),
                    reason: "InternalError".to_string(),
                    code: 500,
                }),
            });
        }
        Ok(())
    }
}

/// In-memory [`ObjectStore`] with NotFound/AlreadyExists semantics and
/// failure injection per verb, kind and name.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key<K: Resource<DynamicType = ()>>(namespace: &str, name: &str) -> ObjectKey {
        (K::kind(&()).into_owned(), namespace.to_string(), name.to_string())
    }

    /// Seed an object without recording a call
    pub fn insert<K: Resource<DynamicType = ()> + Serialize>(&self, obj: &K) {
        let key = Self::key::<K>(&obj.namespace().unwrap_or_default(), &obj.name_any());
        let value = serde_json::to_value(obj).unwrap();
        self.state.lock().unwrap().objects.insert(key, value);
    }

    pub fn object<K: Resource<DynamicType = ()> + DeserializeOwned>(
        &self,
        namespace: &str,
        name: &str,
    ) -> Option<K> {
        let state = self.state.lock().unwrap();
        state
            .objects
            .get(&Self::key::<K>(namespace, name))
            .map(|v| serde_json::from_value(v.clone()).unwrap())
    }

    pub fn count<K: Resource<DynamicType = ()>>(&self) -> usize {
        let kind = K::kind(&());
        let state = self.state.lock().unwrap();
        state.objects.keys().filter(|(k, _, _)| *k == kind).count()
    }

    /// Make every `verb` on `kind`/`name` fail with a server error until cleared
    pub fn fail<K: Resource<DynamicType = ()>>(&self, verb: Verb, name: &str) {
        self.state
            .lock()
            .unwrap()
            .failures
            .push((verb, K::kind(&()).into_owned(), name.to_string()));
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().failures.clear();
    }

    /// Mutating calls in order, formatted as `"<verb> <Kind> <ns>/<name>"`
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn reset_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }
}

#[async_trait]
impl<K> ObjectStore<K> for MemoryStore
where
    K: Resource<DynamicType = ()> + Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<K, StoreError> {
        let kind = K::kind(&()).into_owned();
        let mut state = self.state.lock().unwrap();
        state.enter(Verb::Get, &kind, namespace, name)?;
        match state.objects.get(&Self::key::<K>(namespace, name)) {
            Some(value) => Ok(serde_json::from_value(value.clone()).unwrap()),
            None => Err(StoreError::NotFound {
                kind,
                name: name.to_string(),
            }),
        }
    }

    async fn create(&self, obj: &K) -> Result<K, StoreError> {
        let kind = K::kind(&()).into_owned();
        let namespace = obj.namespace().unwrap_or_default();
        let name = obj.name_any();
        let mut state = self.state.lock().unwrap();
        state.enter(Verb::Create, &kind, &namespace, &name)?;

        let key = Self::key::<K>(&namespace, &name);
        if state.objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists { kind, name });
        }
        state.objects.insert(key, serde_json::to_value(obj).unwrap());
        Ok(obj.clone())
    }

    async fn update(&self, obj: &K) -> Result<K, StoreError> {
        let kind = K::kind(&()).into_owned();
        let namespace = obj.namespace().unwrap_or_default();
        let name = obj.name_any();
        let mut state = self.state.lock().unwrap();
        state.enter(Verb::Update, &kind, &namespace, &name)?;

        let key = Self::key::<K>(&namespace, &name);
        if !state.objects.contains_key(&key) {
            return Err(StoreError::NotFound { kind, name });
        }
        state.objects.insert(key, serde_json::to_value(obj).unwrap());
        Ok(obj.clone())
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let kind = K::kind(&()).into_owned();
        let mut state = self.state.lock().unwrap();
        state.enter(Verb::Delete, &kind, namespace, name)?;

        match state.objects.remove(&Self::key::<K>(namespace, name)) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound {
                kind,
                name: name.to_string(),
            }),
        }
    }
}

/// Settings served from a fixed map
#[derive(Default)]
pub struct StaticSettings {
    values: HashMap<String, String>,
}

impl StaticSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.values.insert(name.to_string(), value.to_string());
        self
    }
}

impl SettingsSource for StaticSettings {
    fn value(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }
}

/// Issues `token-1`, `token-2`, ... so reissues are visible in assertions
#[derive(Default)]
pub struct SequenceTokenIssuer {
    issued: AtomicUsize,
}

impl TokenIssuer for SequenceTokenIssuer {
    fn issue(&self) -> crate::error::Result<String> {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("token-{}", n))
    }
}

pub struct FailingTokenIssuer;

impl TokenIssuer for FailingTokenIssuer {
    fn issue(&self) -> crate::error::Result<String> {
        Err(RegistrationError::Randomness("entropy source unavailable".to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct RecordedEvent {
    pub object: ObjectReference,
    pub type_: EventType,
    pub reason: String,
    pub note: Option<String>,
}

/// Collects published events in memory
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, reason: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.reason == reason)
            .count()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(
        &self,
        object: &ObjectReference,
        type_: EventType,
        reason: &str,
        _action: &str,
        note: Option<String>,
    ) {
        self.events.lock().unwrap().push(RecordedEvent {
            object: object.clone(),
            type_,
            reason: reason.to_string(),
            note,
        });
    }
}

/// A mock HTTP service that returns predefined responses based on request paths.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn on(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert((method.to_string(), path.to_string()), (status, body.to_string()));
        self
    }

    /// Add a response for GET requests matching the exact path
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.on("GET", path, status, body)
    }

    /// Add a response for POST requests matching the exact path
    pub fn on_post(self, path: &str, status: u16, body: &str) -> Self {
        self.on("POST", path, status, body)
    }

    /// Add a response for PATCH requests matching the exact path
    pub fn on_patch(self, path: &str, status: u16, body: &str) -> Self {
        self.on("PATCH", path, status, body)
    }

    /// Add a response for DELETE requests matching the exact path
    pub fn on_delete(self, path: &str, status: u16, body: &str) -> Self {
        self.on("DELETE", path, status, body)
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "https://kubernetes.default.svc")
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        let responses = self.responses.lock().unwrap();
        responses
            .get(&(method.to_string(), path.to_string()))
            .cloned()
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();

        let (status, body) = self
            .find_response(&method, &path)
            .unwrap_or_else(|| (404, not_found_json("", &path)));

        Box::pin(async move {
            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body.into_bytes()))
                .unwrap())
        })
    }
}

/// A `Status` response body as returned by the API server on failures
pub fn status_json(code: u16, reason: &str, message: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": message,
        "reason": reason,
        "code": code
    })
    .to_string()
}

/// Create a 404 not found response
pub fn not_found_json(resource: &str, name: &str) -> String {
    status_json(404, "NotFound", &format!("{} \"{}\" not found", resource, name))
}
