//! In-memory engine for tests and local development.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use serde_json::{json, Value};
use tracing::info;

use super::{ContainerDetails, Engine, EngineError, LogStream, LogsQuery};
use crate::fleet::{ContainerRecord, ContainerState};

#[derive(Default)]
struct MockState {
    containers: Vec<ContainerRecord>,
    env: HashMap<String, Vec<String>>,
    logs: HashMap<String, Bytes>,
    follow: HashMap<String, Vec<Bytes>>,
    failing_inspects: HashSet<String>,
}

/// Engine whose fleet is set by the caller.
///
/// Containers are matched by id or by display name, like the real engine.
/// Followed logs yield the configured chunks and then stay open until the
/// stream is dropped.
pub struct MockEngine {
    state: Mutex<MockState>,
    available: AtomicBool,
    inspect_calls: AtomicUsize,
    follow_calls: AtomicUsize,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            available: AtomicBool::new(true),
            inspect_calls: AtomicUsize::new(0),
            follow_calls: AtomicUsize::new(0),
        }
    }

    /// Replace the listed fleet.
    pub fn set_containers(&self, containers: Vec<ContainerRecord>) {
        self.lock().containers = containers;
    }

    /// Set the full environment an inspect returns for `id`.
    pub fn set_env(&self, id: &str, env: Vec<String>) {
        self.lock().env.insert(id.to_string(), env);
    }

    /// Toggle reachability. An unavailable engine fails every call.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Set the multiplexed body a bounded log fetch returns.
    pub fn set_logs(&self, id: &str, body: impl Into<Bytes>) {
        self.lock().logs.insert(id.to_string(), body.into());
    }

    /// Set the chunks a log follow yields.
    pub fn set_follow_chunks(&self, id: &str, chunks: Vec<Bytes>) {
        self.lock().follow.insert(id.to_string(), chunks);
    }

    /// Make inspects of `id` fail with a server error.
    pub fn fail_inspect(&self, id: &str) {
        self.lock().failing_inspects.insert(id.to_string());
    }

    pub fn inspect_calls(&self) -> usize {
        self.inspect_calls.load(Ordering::SeqCst)
    }

    pub fn follow_calls(&self) -> usize {
        self.follow_calls.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_available(&self) -> Result<(), EngineError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(EngineError::Unavailable("connection refused".to_string()))
        }
    }

    fn find(&self, id: &str) -> Result<ContainerRecord, EngineError> {
        self.lock()
            .containers
            .iter()
            .find(|c| c.id == id || c.identity() == id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("No such container: {id}")))
    }

    fn set_state(&self, id: &str, state: ContainerState) -> Result<(), EngineError> {
        self.check_available()?;
        let mut guard = self.lock();
        let container = guard
            .containers
            .iter_mut()
            .find(|c| c.id == id || c.identity() == id)
            .ok_or_else(|| EngineError::NotFound(format!("No such container: {id}")))?;
        container.state = state;
        info!(id, state = %state, "[MOCK] Container state changed");
        Ok(())
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Engine for MockEngine {
    async fn ping(&self) -> Result<(), EngineError> {
        self.check_available()
    }

    async fn list_containers(&self) -> Result<Vec<ContainerRecord>, EngineError> {
        self.check_available()?;
        Ok(self.lock().containers.clone())
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerDetails, EngineError> {
        self.inspect_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let container = self.find(id)?;
        let guard = self.lock();
        if guard.failing_inspects.contains(&container.id) {
            return Err(EngineError::Status {
                status: 500,
                message: "inspect failed".to_string(),
            });
        }
        let env = guard.env.get(&container.id).cloned().unwrap_or_default();
        Ok(ContainerDetails::new(json!({
            "Id": container.id,
            "Name": format!("/{}", container.identity()),
            "State": { "Status": container.state.as_str() },
            "Config": { "Image": container.image, "Env": env },
        })))
    }

    async fn start_container(&self, id: &str) -> Result<(), EngineError> {
        self.set_state(id, ContainerState::Running)
    }

    async fn stop_container(&self, id: &str) -> Result<(), EngineError> {
        self.set_state(id, ContainerState::Exited)
    }

    async fn restart_container(&self, id: &str) -> Result<(), EngineError> {
        self.set_state(id, ContainerState::Running)
    }

    async fn remove_container(&self, id: &str) -> Result<(), EngineError> {
        self.check_available()?;
        let container = self.find(id)?;
        self.lock().containers.retain(|c| c.id != container.id);
        Ok(())
    }

    async fn container_logs(&self, id: &str, _query: LogsQuery) -> Result<Bytes, EngineError> {
        self.check_available()?;
        let container = self.find(id)?;
        Ok(self
            .lock()
            .logs
            .get(&container.id)
            .cloned()
            .unwrap_or_default())
    }

    async fn follow_logs(&self, id: &str, _tail: usize) -> Result<LogStream, EngineError> {
        self.follow_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let container = self.find(id)?;
        let chunks = self
            .lock()
            .follow
            .get(&container.id)
            .cloned()
            .unwrap_or_default();
        Ok(stream::iter(chunks.into_iter().map(Ok))
            .chain(stream::pending())
            .boxed())
    }

    async fn container_stats(&self, id: &str) -> Result<Value, EngineError> {
        self.check_available()?;
        let container = self.find(id)?;
        Ok(json!({
            "id": container.id,
            "name": format!("/{}", container.identity()),
            "memory_stats": { "usage": 0 },
        }))
    }

    async fn info(&self) -> Result<Value, EngineError> {
        self.check_available()?;
        let guard = self.lock();
        let running = guard
            .containers
            .iter()
            .filter(|c| c.state == ContainerState::Running)
            .count();
        Ok(json!({
            "Containers": guard.containers.len(),
            "ContainersRunning": running,
            "Name": "mock-engine",
        }))
    }
}
