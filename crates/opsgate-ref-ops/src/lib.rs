//! # opsgate-ref-ops
//!
//! IT operations reference runtime for the opsgate request-to-plan pipeline.
//!
//! Demonstrates the pipeline on a fictional five-host estate:
//!
//! 1. **Asset inventory**: a read-only request planned without approval,
//!    batched with a monitoring query.
//! 2. **Production stop**: a high-risk stop that needs the on-call SRE, with
//!    a placeholder for the missing host and a compensating rollback.
//! 3. **Ambiguous requests**: vague text produces a clarification prompt
//!    instead of a Plan.
//! 4. **Backend failures**: timeout, unreachable service, and a response the
//!    verifier rejects all surface as `BackendUnavailable`.
//! 5. **Service restart**: a composite action expanded into ordered stop and
//!    start steps.
//! 6. **Fleet script**: an OS-family target resolved through the inventory.
//! 7. **Cyclic catalog**: contradictory ordering metadata is refused.
//!
//! All data is hardcoded. No external calls are made.

pub mod mock_data;
pub mod report;
pub mod runtime;
pub mod scenarios;

pub use runtime::OpsRuntime;
