//! # opsgate-backend
//!
//! Implementations of [`ReasoningBackend`](opsgate_core::traits::ReasoningBackend).
//!
//! - [`ScriptedBackend`]: deterministic responses keyed by task and input,
//!   with delay and outage simulation. Used by tests and the reference
//!   scenarios.
//! - [`HttpReasoningBackend`]: POSTs each request as JSON to a reasoning
//!   service and returns the JSON body.
//!
//! Neither is trusted. Responses still pass through the gateway's timeout
//! and the `ResponseVerifier`.

pub mod http;
pub mod scripted;

pub use http::{HttpBackendConfig, HttpReasoningBackend};
pub use scripted::{Script, ScriptedBackend};
