//! A deterministic `ReasoningBackend` for tests and demos.
//!
//! Responses are keyed by (task, input text). A key can answer, answer after
//! a delay, or behave as an unreachable service. Unknown keys fall back to
//! an optional default, otherwise they fail as unreachable.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use opsgate_contracts::{
    backend::{BackendRequest, BackendTask},
    error::{OpsgateError, OpsgateResult},
};
use opsgate_core::traits::ReasoningBackend;

/// What the backend does for one scripted key.
#[derive(Debug, Clone)]
pub enum Script {
    Respond(Value),
    /// Sleep, then respond. Longer than the gateway timeout simulates a
    /// hung backend.
    Delayed(Duration, Value),
    Unreachable(String),
}

#[derive(Debug, Default)]
pub struct ScriptedBackend {
    name: String,
    scripts: HashMap<(&'static str, String), Script>,
    fallback: Option<Script>,
    calls: Mutex<Vec<(BackendTask, String)>>,
}

impl ScriptedBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    /// Script the response to `task` for exactly `input`.
    pub fn on(mut self, task: BackendTask, input: impl Into<String>, script: Script) -> Self {
        self.scripts.insert((task.as_str(), input.into()), script);
        self
    }

    pub fn respond(self, task: BackendTask, input: impl Into<String>, response: Value) -> Self {
        self.on(task, input, Script::Respond(response))
    }

    /// Used for any (task, input) pair without its own script.
    pub fn with_fallback(mut self, script: Script) -> Self {
        self.fallback = Some(script);
        self
    }

    /// Every call received so far, in arrival order.
    pub fn calls(&self) -> Vec<(BackendTask, String)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self, task: BackendTask) -> usize {
        self.calls().iter().filter(|(t, _)| *t == task).count()
    }
}

#[async_trait]
impl ReasoningBackend for ScriptedBackend {
    async fn invoke(&self, request: &BackendRequest) -> OpsgateResult<Value> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((request.task, request.input.clone()));
        }

        let key = (request.task.as_str(), request.input.clone());
        let script = self.scripts.get(&key).or(self.fallback.as_ref()).cloned();
        debug!(backend = %self.name, task = request.task.as_str(), scripted = script.is_some(), "scripted call");

        match script {
            Some(Script::Respond(value)) => Ok(value),
            Some(Script::Delayed(delay, value)) => {
                tokio::time::sleep(delay).await;
                Ok(value)
            }
            Some(Script::Unreachable(reason)) => Err(OpsgateError::BackendUnavailable { reason }),
            None => Err(OpsgateError::BackendUnavailable {
                reason: format!("no scripted {} response for '{}'", request.task.as_str(), request.input),
            }),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
