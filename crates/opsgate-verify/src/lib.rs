//! # opsgate-verify
//!
//! Verification of reasoning backend responses.
//!
//! This crate provides [`engine::SchemaVerifier`], which implements the
//! [`opsgate_core::traits::ResponseVerifier`] trait. Every backend response
//! is checked in two phases before any stage reads it:
//!
//! 1. **Structural**: JSON Schema validation via the `jsonschema` crate.
//! 2. **Semantic**: the schema's rules (`RequiredField`, `AllowedValues`,
//!    `NumberRange`, `Custom`) evaluated against the response.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use opsgate_verify::SchemaVerifier;
//!
//! let mut verifier = SchemaVerifier::new();
//! verifier.register_rule("non-empty-action", Box::new(|response| {
//!     match response.get("action").and_then(|v| v.as_str()) {
//!         Some(a) if !a.trim().is_empty() => None,
//!         _ => Some("action must be a non-empty string".to_string()),
//!     }
//! }));
//! ```

pub mod engine;

pub use engine::{CustomVerifierFn, SchemaVerifier};
