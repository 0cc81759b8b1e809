//! Resource scanner stage.
//!
//! Enumerates the subscription's resources from the management REST API
//! and appends one [`ScanResult`] to the session. A failed scan appends
//! nothing; it records an error diagnostic instead, which is how a scan
//! failure stays distinguishable from a scan that legitimately found an
//! empty subscription.

use crate::config;
use crate::models::{Resource, ResourceKind, ScanResult, StageKind};
use crate::pipeline::Stage;
use crate::session::SessionContext;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Settings for the scanner stage.
#[derive(Debug, Clone)]
pub struct ScannerSettings {
    /// Management API base URL.
    pub endpoint: String,
    /// API version query parameter.
    pub api_version: String,
    /// Bearer token for the management API.
    pub access_token: Option<String>,
    /// Maximum number of resources to keep from a scan.
    pub limit: usize,
    /// Per-request timeout.
    pub timeout_seconds: u64,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://management.azure.com".to_string(),
            api_version: "2021-04-01".to_string(),
            access_token: None,
            limit: 50,
            timeout_seconds: 60,
        }
    }
}

impl From<&config::ScanConfig> for ScannerSettings {
    fn from(config: &config::ScanConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            api_version: config.api_version.clone(),
            access_token: std::env::var("AZURE_ACCESS_TOKEN").ok(),
            limit: config.limit,
            timeout_seconds: config.timeout_seconds,
        }
    }
}

/// Raw resource record as returned by the management API.
#[derive(Debug, Deserialize)]
struct RawResource {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(rename = "type")]
    resource_type: String,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    sku: Option<serde_json::Value>,
    #[serde(default)]
    tags: Option<serde_json::Value>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ResourceListResponse {
    #[serde(default)]
    value: Vec<RawResource>,
}

/// Extracts the resource group name from a full resource id path.
fn resource_group_from_id(id: &str) -> Option<String> {
    let mut segments = id.split('/').peekable();
    while let Some(segment) = segments.next() {
        if segment.eq_ignore_ascii_case("resourceGroups") {
            return segments.next().map(str::to_string);
        }
    }
    None
}

/// Maps a raw API record into the pipeline's resource shape.
fn into_resource(raw: RawResource) -> Resource {
    let mut resource = Resource::new(ResourceKind::from(raw.resource_type.as_str()), raw.name);

    resource.location = raw.location;
    resource.resource_group = raw.id.as_deref().and_then(resource_group_from_id);

    let attrs = &mut resource.attributes;
    attrs.insert(
        "provider_type".to_string(),
        serde_json::Value::String(raw.resource_type),
    );
    if let Some(id) = raw.id {
        attrs.insert("id".to_string(), serde_json::Value::String(id));
    }
    if let Some(sku) = raw.sku {
        if let Some(tier) = sku.get("tier").and_then(|t| t.as_str()) {
            attrs.insert(
                "sku_tier".to_string(),
                serde_json::Value::String(tier.to_string()),
            );
        }
        attrs.insert("sku".to_string(), sku);
    }
    if let Some(tags) = raw.tags {
        attrs.insert("tags".to_string(), tags);
    }
    for (key, value) in raw.extra {
        attrs.entry(key).or_insert(value);
    }

    resource
}

/// Scanner stage: management API enumeration.
pub struct ScannerStage {
    settings: ScannerSettings,
    client: reqwest::Client,
}

impl ScannerStage {
    /// Creates a scanner with the given settings.
    pub fn new(settings: ScannerSettings) -> Self {
        Self {
            settings,
            client: reqwest::Client::new(),
        }
    }

    /// Fetches the subscription's resource list.
    async fn enumerate(&self, subscription_id: &str) -> Result<Vec<Resource>> {
        let token = self
            .settings
            .access_token
            .as_deref()
            .context("no management API token; set AZURE_ACCESS_TOKEN")?;

        let url = format!(
            "{}/subscriptions/{}/resources?api-version={}&$top={}",
            self.settings.endpoint, subscription_id, self.settings.api_version, self.settings.limit
        );
        debug!("enumerating resources: {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .timeout(Duration::from_secs(self.settings.timeout_seconds))
            .send()
            .await
            .context("management API request failed")?
            .error_for_status()
            .context("management API returned an error status")?;

        let body: ResourceListResponse = response
            .json()
            .await
            .context("failed to decode resource list")?;

        Ok(body
            .value
            .into_iter()
            .take(self.settings.limit)
            .map(into_resource)
            .collect())
    }
}

#[async_trait]
impl Stage for ScannerStage {
    fn kind(&self) -> StageKind {
        StageKind::Scan
    }

    async fn run(&self, mut ctx: SessionContext) -> SessionContext {
        let started = Instant::now();
        let subscription_id = ctx.subscription_id().to_string();

        match self.enumerate(&subscription_id).await {
            Ok(resources) => {
                info!(
                    "scan found {} resources in {:.1}s",
                    resources.len(),
                    started.elapsed().as_secs_f64()
                );
                ctx.record_scan(ScanResult::new(
                    subscription_id,
                    resources,
                    started.elapsed().as_secs_f64(),
                ));
            }
            Err(e) => {
                warn!("resource scan failed: {e:#}");
                ctx.error(StageKind::Scan, format!("resource scan failed: {e:#}"));
            }
        }

        ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawResource {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_resource_group_from_id() {
        let id = "/subscriptions/abc/resourceGroups/rg-prod/providers/Microsoft.Compute/virtualMachines/vm-1";
        assert_eq!(resource_group_from_id(id), Some("rg-prod".to_string()));
        assert_eq!(resource_group_from_id("/subscriptions/abc"), None);
    }

    #[test]
    fn test_into_resource_maps_kind_and_group() {
        let resource = into_resource(raw(json!({
            "id": "/subscriptions/abc/resourceGroups/rg-web/providers/Microsoft.Compute/virtualMachines/vm-web-01",
            "name": "vm-web-01",
            "type": "Microsoft.Compute/virtualMachines",
            "location": "westeurope"
        })));

        assert_eq!(resource.kind, ResourceKind::VirtualMachine);
        assert_eq!(resource.name, "vm-web-01");
        assert_eq!(resource.location.as_deref(), Some("westeurope"));
        assert_eq!(resource.resource_group.as_deref(), Some("rg-web"));
        assert_eq!(
            resource.attribute_str("provider_type"),
            Some("Microsoft.Compute/virtualMachines")
        );
    }

    #[test]
    fn test_into_resource_keeps_sku_tier_and_extras() {
        let resource = into_resource(raw(json!({
            "name": "stprodlogs",
            "type": "Microsoft.Storage/storageAccounts",
            "sku": {"name": "Premium_LRS", "tier": "Premium"},
            "properties": {"accessTier": "Hot"}
        })));

        assert_eq!(resource.kind, ResourceKind::StorageAccount);
        assert_eq!(resource.attribute_str("sku_tier"), Some("Premium"));
        assert!(resource.attributes.contains_key("properties"));
    }

    #[test]
    fn test_unknown_type_becomes_other() {
        let resource = into_resource(raw(json!({
            "name": "cdn-edge",
            "type": "Microsoft.Cdn/profiles"
        })));

        assert_eq!(
            resource.kind,
            ResourceKind::Other("Microsoft.Cdn/profiles".to_string())
        );
    }

    #[tokio::test]
    async fn test_missing_token_records_error_not_scan() {
        let stage = ScannerStage::new(ScannerSettings {
            access_token: None,
            ..ScannerSettings::default()
        });
        let ctx = SessionContext::with_session_id("s-1", "sub-1", "ten-1");

        let out = stage.run(ctx).await;

        assert!(out.scan_history().is_empty());
        assert_eq!(out.errors().count(), 1);
        let message = &out.diagnostics()[0].message;
        assert!(message.contains("AZURE_ACCESS_TOKEN"), "{message}");
    }
}
