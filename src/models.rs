//! Data models for the cost optimization pipeline.
//!
//! This module contains all the core data structures used throughout
//! the application for representing resources, scans, cost analyses,
//! recommendations, and diagnostics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// A resource whose monthly cost exceeds this threshold is high-cost.
pub const HIGH_COST_THRESHOLD_USD: f64 = 100.0;

/// One phase of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    /// Enumerate the subscription's resources.
    Scan,
    /// Estimate monthly cost for the scanned resources.
    Analyze,
    /// Generate optimization recommendations.
    Optimize,
    /// Assemble report documents.
    Report,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Scan => write!(f, "scan"),
            StageKind::Analyze => write!(f, "analyze"),
            StageKind::Optimize => write!(f, "optimize"),
            StageKind::Report => write!(f, "report"),
        }
    }
}

/// Kind of cloud resource.
///
/// Parses both the provider's `Namespace/type` strings (as returned by the
/// management API) and its own snake_case labels, and serializes as the
/// snake_case label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    VirtualMachine,
    ManagedDisk,
    StorageAccount,
    SqlDatabase,
    AppService,
    PublicIpAddress,
    LoadBalancer,
    VirtualNetwork,
    KeyVault,
    Other(String),
}

impl ResourceKind {
    /// Returns the stable snake_case label for this kind.
    pub fn as_str(&self) -> &str {
        match self {
            ResourceKind::VirtualMachine => "virtual_machine",
            ResourceKind::ManagedDisk => "managed_disk",
            ResourceKind::StorageAccount => "storage_account",
            ResourceKind::SqlDatabase => "sql_database",
            ResourceKind::AppService => "app_service",
            ResourceKind::PublicIpAddress => "public_ip_address",
            ResourceKind::LoadBalancer => "load_balancer",
            ResourceKind::VirtualNetwork => "virtual_network",
            ResourceKind::KeyVault => "key_vault",
            ResourceKind::Other(s) => s,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for ResourceKind {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "microsoft.compute/virtualmachines" | "virtual_machine" => {
                ResourceKind::VirtualMachine
            }
            "microsoft.compute/disks" | "managed_disk" => ResourceKind::ManagedDisk,
            "microsoft.storage/storageaccounts" | "storage_account" => {
                ResourceKind::StorageAccount
            }
            "microsoft.sql/servers/databases" | "sql_database" => ResourceKind::SqlDatabase,
            "microsoft.web/sites" | "app_service" => ResourceKind::AppService,
            "microsoft.network/publicipaddresses" | "public_ip_address" => {
                ResourceKind::PublicIpAddress
            }
            "microsoft.network/loadbalancers" | "load_balancer" => ResourceKind::LoadBalancer,
            "microsoft.network/virtualnetworks" | "virtual_network" => {
                ResourceKind::VirtualNetwork
            }
            "microsoft.keyvault/vaults" | "key_vault" => ResourceKind::KeyVault,
            _ => ResourceKind::Other(s.to_string()),
        }
    }
}

impl Serialize for ResourceKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ResourceKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ResourceKind::from(s.as_str()))
    }
}

/// A single cloud resource discovered by the scanner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Kind of resource.
    pub kind: ResourceKind,
    /// Resource name.
    pub name: String,
    /// Region the resource is deployed in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Resource group the resource belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,
    /// Scanner-defined attributes (sku, power state, attachment, ...).
    /// Opaque to the pipeline; individual stages may inspect known keys.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl Resource {
    /// Creates a resource with no location, group, or attributes.
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            location: None,
            resource_group: None,
            attributes: serde_json::Map::new(),
        }
    }

    /// Returns a string attribute by key, if present.
    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_str())
    }
}

/// Snapshot of one completed resource scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Subscription the scan ran against.
    pub subscription_id: String,
    /// Resources discovered, in enumeration order.
    pub resources: Vec<Resource>,
    /// Number of resources discovered. Always equals `resources.len()`.
    pub resources_found: usize,
    /// Wall-clock duration of the scan in seconds.
    pub scan_duration_seconds: f64,
    /// When the scan completed.
    pub completed_at: DateTime<Utc>,
}

impl ScanResult {
    /// Creates a scan result, deriving `resources_found` from the resource list.
    pub fn new(
        subscription_id: impl Into<String>,
        resources: Vec<Resource>,
        scan_duration_seconds: f64,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resources_found: resources.len(),
            resources,
            scan_duration_seconds,
            completed_at: Utc::now(),
        }
    }
}

/// Per-resource monthly cost figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceCost {
    pub resource_name: String,
    pub cost_usd: f64,
}

/// A resource whose cost deviates from its peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostAnomaly {
    pub resource_name: String,
    pub cost_usd: f64,
    /// Human-readable explanation of why the cost is anomalous.
    pub reason: String,
}

/// Result of one cost analysis pass over the latest scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostAnalysis {
    /// Estimated total monthly cost across all analyzed resources.
    pub total_cost_usd: f64,
    /// Monthly cost per resource kind label.
    pub cost_breakdown: BTreeMap<String, f64>,
    /// Resources above [`HIGH_COST_THRESHOLD_USD`], highest cost first.
    pub high_cost_resources: Vec<ResourceCost>,
    /// Resources flagged as cost anomalies.
    pub cost_anomalies: Vec<CostAnomaly>,
    /// Wall-clock duration of the analysis in seconds.
    pub analysis_duration_seconds: f64,
}

/// Urgency of a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Low urgency - housekeeping, minor savings
    Low,
    /// Medium urgency - worthwhile savings, low risk
    Medium,
    /// High urgency - significant waste or anomalous spend
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "Low"),
            Priority::Medium => write!(f, "Medium"),
            Priority::High => write!(f, "High"),
        }
    }
}

impl Priority {
    /// Returns an emoji representation of the priority.
    pub fn emoji(&self) -> &'static str {
        match self {
            Priority::Low => "🟢",
            Priority::Medium => "🟡",
            Priority::High => "🔴",
        }
    }
}

/// A single cost optimization recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Short title describing the action.
    pub title: String,
    /// Detailed description of the opportunity.
    pub description: String,
    /// Estimated monthly savings if implemented.
    pub estimated_savings_usd: f64,
    /// Urgency of the recommendation.
    pub priority: Priority,
    /// Free-form effort descriptor (e.g. "Low", "1-2 days").
    pub implementation_effort: String,
    /// Ordered steps to implement the recommendation.
    pub implementation_steps: Vec<String>,
}

/// Severity of a diagnostic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    /// Recoverable or informational condition.
    Warning,
    /// Serious failure; the stage returned a partial result.
    Error,
}

/// A diagnostic recorded by a stage.
///
/// Stages never abort the run on internal failure; they record one of
/// these and return a usable (possibly partial) context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    /// Stage that recorded the diagnostic.
    pub stage: StageKind,
    pub message: String,
}

impl Diagnostic {
    /// Creates an error diagnostic.
    pub fn error(stage: StageKind, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Error,
            stage,
            message: message.into(),
        }
    }

    /// Creates a warning diagnostic.
    pub fn warning(stage: StageKind, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Warning,
            stage,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.stage, self.message)
    }
}
