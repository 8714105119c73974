//! Test doubles for the storage and network seams.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::Error;
use crate::cache::{CacheDb, CacheStorage, EntrySummary};
use crate::net::Network;
use crate::origin;
use crate::policy::{CacheSettings, InstallPolicy};
use crate::request::{AssetRequest, CapturedResponse, Headers, ResponseType};

pub(crate) const ORIGIN: &str = "http://app.test/";

/// Absolute URL for a path (or absolute URL) under the test origin.
pub(crate) fn url(path: &str) -> Url {
    origin::resolve(&Url::parse(ORIGIN).unwrap(), path).unwrap()
}

/// Tolerant settings with `/` as fallback.
pub(crate) fn settings(generation: &str, manifest: &[&str]) -> CacheSettings {
    CacheSettings {
        generation: generation.to_string(),
        manifest: manifest.iter().map(|path| url(path)).collect(),
        fallback: url("/"),
        install_policy: InstallPolicy::Tolerant,
    }
}

fn response(target: Url, status: u16, response_type: ResponseType, body: &str) -> CapturedResponse {
    let mut headers = Headers::new();
    headers.insert("content-type".into(), "text/plain".into());
    CapturedResponse { url: target, status, response_type, headers, body: Bytes::from(body.to_string()) }
}

/// In-process network answering from a fixed route table.
///
/// Unknown URLs answer 404; `offline` makes every call fail.
#[derive(Default)]
pub(crate) struct ScriptedNetwork {
    routes: Mutex<HashMap<String, CapturedResponse>>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl ScriptedNetwork {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn route(self, target: &str, status: u16, response_type: ResponseType, body: &str) -> Self {
        let target = url(target);
        let resp = response(target.clone(), status, response_type, body);
        self.routes.lock().unwrap().insert(target.to_string(), resp);
        self
    }

    pub(crate) fn page(self, path: &str, body: &str) -> Self {
        self.route(path, 200, ResponseType::Basic, body)
    }

    pub(crate) fn status(self, path: &str, status: u16, body: &str) -> Self {
        self.route(path, status, ResponseType::Basic, body)
    }

    pub(crate) fn opaque(self, target: &str, body: &str) -> Self {
        self.route(target, 200, ResponseType::Opaque, body)
    }

    pub(crate) fn cors(self, target: &str, body: &str) -> Self {
        self.route(target, 200, ResponseType::Cors, body)
    }

    pub(crate) fn offline(self) -> Self {
        self.set_offline(true);
        self
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub(crate) fn replace(&self, path: &str, body: &str) {
        let target = url(path);
        let resp = response(target.clone(), 200, ResponseType::Basic, body);
        self.routes.lock().unwrap().insert(target.to_string(), resp);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &AssetRequest) -> Result<CapturedResponse, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("offline: {}", request.url)));
        }
        let found = self.routes.lock().unwrap().get(request.url.as_str()).cloned();
        Ok(found.unwrap_or_else(|| response(request.url.clone(), 404, ResponseType::Basic, "not found")))
    }
}

/// `CacheDb` wrapper that fails selected operations.
pub(crate) struct FlakyStorage {
    inner: CacheDb,
    fail_delete: HashSet<String>,
    fail_match: bool,
}

impl FlakyStorage {
    pub(crate) fn new(inner: CacheDb) -> Self {
        Self { inner, fail_delete: HashSet::new(), fail_match: false }
    }

    pub(crate) fn fail_delete(mut self, name: &str) -> Self {
        self.fail_delete.insert(name.to_string());
        self
    }

    pub(crate) fn fail_match(mut self) -> Self {
        self.fail_match = true;
        self
    }
}

#[async_trait]
impl CacheStorage for FlakyStorage {
    async fn open(&self, name: &str) -> Result<(), Error> {
        self.inner.open(name).await
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.inner.keys().await
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        if self.fail_delete.contains(name) {
            return Err(Error::CorruptEntry(format!("injected delete failure for {name}")));
        }
        self.inner.delete(name).await
    }

    async fn match_request(&self, name: &str, request: &AssetRequest) -> Result<Option<CapturedResponse>, Error> {
        if self.fail_match {
            return Err(Error::CorruptEntry("injected match failure".into()));
        }
        self.inner.match_request(name, request).await
    }

    async fn put(&self, name: &str, request: &AssetRequest, response: &CapturedResponse) -> Result<(), Error> {
        self.inner.put(name, request, response).await
    }

    async fn put_all(&self, name: &str, batch: &[(AssetRequest, CapturedResponse)]) -> Result<usize, Error> {
        self.inner.put_all(name, batch).await
    }

    async fn entries(&self, name: &str) -> Result<Vec<EntrySummary>, Error> {
        self.inner.entries(name).await
    }
}
