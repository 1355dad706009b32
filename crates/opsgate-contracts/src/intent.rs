//! Intent, entity, and risk types produced by classification.
//!
//! `IntentCategory::required_capabilities` is the single category →
//! capability lookup table used by the matcher. It is an exhaustive match:
//! adding a category without deciding its capabilities does not compile.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::capability::Capability;

/// Operational domain a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentCategory {
    AssetManagement,
    ServiceManagement,
    Monitoring,
    NetworkDiagnostics,
    FileOperations,
    Automation,
    Troubleshooting,
}

impl IntentCategory {
    /// Every category, in declaration order.
    pub const ALL: [IntentCategory; 7] = [
        IntentCategory::AssetManagement,
        IntentCategory::ServiceManagement,
        IntentCategory::Monitoring,
        IntentCategory::NetworkDiagnostics,
        IntentCategory::FileOperations,
        IntentCategory::Automation,
        IntentCategory::Troubleshooting,
    ];

    /// Capabilities a tool must offer (at least one of) to serve this category.
    ///
    /// `AssetManagement` maps to `AssetQuery` only. A metrics tool is never a
    /// candidate for an asset request.
    pub fn required_capabilities(self) -> &'static [Capability] {
        match self {
            IntentCategory::AssetManagement => &[Capability::AssetQuery],
            IntentCategory::ServiceManagement => {
                &[Capability::ServiceControl, Capability::ServiceStatus]
            }
            IntentCategory::Monitoring => &[Capability::Metrics, Capability::LogQuery],
            IntentCategory::NetworkDiagnostics => &[Capability::NetworkProbe],
            IntentCategory::FileOperations => &[Capability::FileRead, Capability::FileWrite],
            IntentCategory::Automation => &[Capability::CommandExec],
            IntentCategory::Troubleshooting => &[
                Capability::LogQuery,
                Capability::ServiceStatus,
                Capability::NetworkProbe,
            ],
        }
    }

    /// Entity kinds a well-specified request in this category usually names.
    ///
    /// Drives the entity-coverage term of the confidence score. An empty
    /// slice means the category needs no entities (coverage is 1.0).
    pub fn expected_entities(self) -> &'static [EntityType] {
        match self {
            IntentCategory::AssetManagement => &[],
            IntentCategory::ServiceManagement => &[EntityType::Hostname, EntityType::Service],
            IntentCategory::Monitoring => &[EntityType::Hostname],
            IntentCategory::NetworkDiagnostics => &[EntityType::Hostname],
            IntentCategory::FileOperations => &[EntityType::Hostname, EntityType::FilePath],
            IntentCategory::Automation => &[EntityType::Hostname],
            IntentCategory::Troubleshooting => &[EntityType::Hostname],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IntentCategory::AssetManagement => "asset_management",
            IntentCategory::ServiceManagement => "service_management",
            IntentCategory::Monitoring => "monitoring",
            IntentCategory::NetworkDiagnostics => "network_diagnostics",
            IntentCategory::FileOperations => "file_operations",
            IntentCategory::Automation => "automation",
            IntentCategory::Troubleshooting => "troubleshooting",
        }
    }
}

impl fmt::Display for IntentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntentCategory {
    type Err = String;

    /// Exact tag match only. No fuzzy matching on category names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IntentCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown intent category '{s}'"))
    }
}

/// The classified intent of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub category: IntentCategory,
    /// Normalized lowercase verb, e.g. "list", "stop", "restart".
    pub action: String,
    /// Combined classification confidence in [0, 1].
    pub confidence: f64,
}

/// Kind of value an entity carries. Also the declared type of tool inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Hostname,
    IpAddress,
    Port,
    FilePath,
    Environment,
    OsFamily,
    Service,
    CommandVerb,
}

impl EntityType {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Hostname => "hostname",
            EntityType::IpAddress => "ip_address",
            EntityType::Port => "port",
            EntityType::FilePath => "file_path",
            EntityType::Environment => "environment",
            EntityType::OsFamily => "os_family",
            EntityType::Service => "service",
            EntityType::CommandVerb => "command_verb",
        }
    }

    /// True for entity kinds that name a machine to act on.
    pub fn is_target(self) -> bool {
        matches!(self, EntityType::Hostname | EntityType::IpAddress | EntityType::OsFamily)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an entity was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitySource {
    /// Reported by the reasoning backend only.
    Backend,
    /// Matched by a deterministic pattern rule only.
    Pattern,
    /// Both the backend and a pattern rule found it.
    Both,
    /// Supplied by the request context rather than the text.
    Context,
}

/// Byte range of an entity inside the request text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A typed value extracted from the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub entity_type: EntityType,
    pub value: String,
    pub confidence: f64,
    pub source: EntitySource,
    pub span: Option<Span>,
}

impl Entity {
    /// Deduplication key: type plus the trimmed, lowercased value.
    pub fn key(&self) -> (EntityType, String) {
        (self.entity_type, self.normalized_value())
    }

    pub fn normalized_value(&self) -> String {
        self.value.trim().to_lowercase()
    }
}

/// Escalating severity classification gating approval and rollback.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// One level up, saturating at `Critical`.
    pub fn escalate(self) -> Self {
        match self {
            RiskLevel::Low => RiskLevel::Medium,
            RiskLevel::Medium => RiskLevel::High,
            RiskLevel::High | RiskLevel::Critical => RiskLevel::Critical,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of answer the request needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    /// Read-only: the request only asks for information.
    Information,
    /// The request mutates state.
    Action,
    /// Confidence fell below the ambiguity threshold; ask for clarification.
    Ambiguous,
}
