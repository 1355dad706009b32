//! The only path from a stage to the reasoning backend.
//!
//! Every call is bounded by a timeout and every response is verified before
//! a stage sees it. Timeouts, transport errors, and malformed responses all
//! surface as `BackendUnavailable`; nothing is retried and nothing is
//! substituted.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use opsgate_contracts::{
    backend::BackendRequest,
    error::{OpsgateError, OpsgateResult},
};

use crate::traits::{ReasoningBackend, ResponseVerifier};

pub struct BackendGateway {
    backend: Arc<dyn ReasoningBackend>,
    verifier: Arc<dyn ResponseVerifier>,
    timeout: Duration,
}

impl BackendGateway {
    pub fn new(
        backend: Arc<dyn ReasoningBackend>,
        verifier: Arc<dyn ResponseVerifier>,
        timeout: Duration,
    ) -> Self {
        Self { backend, verifier, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Invoke the backend and return the verified raw response.
    pub async fn call(&self, request: &BackendRequest) -> OpsgateResult<Value> {
        let task = request.task.as_str();
        let started = Instant::now();

        debug!(
            backend = %self.backend.name(),
            task,
            schema_id = %request.schema.schema_id,
            timeout_ms = self.timeout.as_millis() as u64,
            "calling reasoning backend"
        );

        let response = match tokio::time::timeout(self.timeout, self.backend.invoke(request)).await
        {
            Err(_) => {
                warn!(
                    backend = %self.backend.name(),
                    task,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "reasoning backend timed out"
                );
                return Err(OpsgateError::BackendUnavailable {
                    reason: format!(
                        "{task} call to '{}' timed out after {} ms",
                        self.backend.name(),
                        self.timeout.as_millis()
                    ),
                });
            }
            Ok(Err(e)) => {
                warn!(backend = %self.backend.name(), task, error = %e, "reasoning backend call failed");
                let reason = match e {
                    OpsgateError::BackendUnavailable { reason } => reason,
                    other => other.to_string(),
                };
                return Err(OpsgateError::BackendUnavailable {
                    reason: format!("{task} call to '{}' failed: {reason}", self.backend.name()),
                });
            }
            Ok(Ok(value)) => value,
        };

        let report = self.verifier.verify(&response, &request.schema).map_err(|e| {
            OpsgateError::BackendUnavailable {
                reason: format!("could not verify {task} response: {e}"),
            }
        })?;

        if !report.passed {
            let summary = report.summary();
            warn!(
                backend = %self.backend.name(),
                task,
                schema_id = %request.schema.schema_id,
                failures = %summary,
                "reasoning backend returned a malformed response"
            );
            return Err(OpsgateError::BackendUnavailable {
                reason: format!(
                    "malformed {task} response (schema '{}'): {summary}",
                    request.schema.schema_id
                ),
            });
        }

        debug!(
            backend = %self.backend.name(),
            task,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "reasoning backend response verified"
        );
        Ok(response)
    }

    /// Invoke the backend and deserialize the verified response into `T`.
    ///
    /// A response that passes the schema but still does not fit `T` is
    /// malformed as far as the caller is concerned.
    pub async fn call_as<T: DeserializeOwned>(&self, request: &BackendRequest) -> OpsgateResult<T> {
        let value = self.call(request).await?;
        serde_json::from_value(value).map_err(|e| OpsgateError::BackendUnavailable {
            reason: format!(
                "malformed {} response (schema '{}'): {e}",
                request.task.as_str(),
                request.schema.schema_id
            ),
        })
    }
}
