//! Identifiers linking the stage outputs together.
//!
//! A Plan references its Selection, which references its Decision. All ids
//! are random v4 UUIDs except `StepId`, which is plan-local.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub uuid::Uuid);

        impl $name {
            /// Create a new, unique identifier.
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier of one classified request. Keys the audit trail.
    DecisionId
);

uuid_id!(
    /// Unique identifier of one Stage B selection.
    SelectionId
);

uuid_id!(
    /// Unique identifier of one Stage C plan.
    PlanId
);

uuid_id!(
    /// Shared by every step of a plan so the execution engine can correlate
    /// logs and results across steps.
    CorrelationId
);

/// Plan-local step identifier (`step-1`, `step-2`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(pub String);

impl StepId {
    /// The identifier for the step at 1-based position `n`.
    pub fn nth(n: usize) -> Self {
        Self(format!("step-{n}"))
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
