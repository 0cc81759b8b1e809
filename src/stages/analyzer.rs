//! Cost analyzer stage.
//!
//! Estimates monthly cost for the most recent scan's resources from a
//! rate card keyed by resource kind, adjusted by scanner-provided
//! attributes (sku tier, VM size, power state). Appends one
//! [`CostAnalysis`] to the session per run.

use crate::models::{
    CostAnalysis, CostAnomaly, Resource, ResourceCost, ResourceKind, StageKind,
    HIGH_COST_THRESHOLD_USD,
};
use crate::pipeline::Stage;
use crate::session::SessionContext;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;
use tracing::info;

/// A resource costing more than this multiple of its kind's average is
/// flagged as an anomaly.
const ANOMALY_RATIO: f64 = 2.0;

/// Baseline monthly rate in USD for a kind, before attribute adjustments.
///
/// `None` means the kind is not on the rate card and is excluded from
/// cost totals (recorded as a warning).
fn base_monthly_rate(kind: &ResourceKind) -> Option<f64> {
    match kind {
        ResourceKind::VirtualMachine => Some(70.0),
        ResourceKind::ManagedDisk => Some(9.6),
        ResourceKind::StorageAccount => Some(21.0),
        ResourceKind::SqlDatabase => Some(150.0),
        ResourceKind::AppService => Some(55.0),
        ResourceKind::PublicIpAddress => Some(3.6),
        ResourceKind::LoadBalancer => Some(18.0),
        ResourceKind::VirtualNetwork => Some(0.0),
        ResourceKind::KeyVault => Some(3.0),
        ResourceKind::Other(_) => None,
    }
}

/// Scales a VM's rate by core count relative to a 2-core baseline.
fn size_multiplier(vm_size: &str) -> f64 {
    let digits: String = vm_size
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();

    match digits.parse::<f64>() {
        Ok(cores) if cores > 0.0 => (cores / 2.0).max(0.5),
        _ => 1.0,
    }
}

/// Estimates a resource's monthly cost in USD, rounded to cents.
///
/// Returns `None` for kinds not on the rate card.
pub fn estimate_monthly_cost(resource: &Resource) -> Option<f64> {
    let mut cost = base_monthly_rate(&resource.kind)?;

    if let Some(tier) = resource.attribute_str("sku_tier") {
        cost *= match tier.to_lowercase().as_str() {
            "premium" => 2.5,
            "basic" => 0.5,
            _ => 1.0,
        };
    }

    if let Some(size) = resource.attribute_str("vm_size") {
        cost *= size_multiplier(size);
    }

    // A deallocated VM stops accruing compute charges; attached disks
    // and reserved addresses keep a residual bill.
    if let Some(state) = resource.attribute_str("power_state") {
        if state.eq_ignore_ascii_case("deallocated") {
            cost *= 0.15;
        }
    }

    Some((cost * 100.0).round() / 100.0)
}

/// Cost analyzer stage.
pub struct AnalyzerStage;

impl AnalyzerStage {
    pub fn new() -> Self {
        Self
    }

    fn analyze(resources: &[Resource]) -> (CostAnalysis, BTreeSet<String>) {
        let mut costs: Vec<(&Resource, f64)> = Vec::new();
        let mut unpriced: BTreeSet<String> = BTreeSet::new();

        for resource in resources {
            match estimate_monthly_cost(resource) {
                Some(cost) => costs.push((resource, cost)),
                None => {
                    unpriced.insert(resource.kind.as_str().to_string());
                }
            }
        }

        let mut cost_breakdown: BTreeMap<String, f64> = BTreeMap::new();
        for (resource, cost) in &costs {
            *cost_breakdown
                .entry(resource.kind.as_str().to_string())
                .or_insert(0.0) += cost;
        }

        let total_cost_usd = costs.iter().map(|(_, c)| c).sum();

        let mut high_cost_resources: Vec<ResourceCost> = costs
            .iter()
            .filter(|(_, cost)| *cost > HIGH_COST_THRESHOLD_USD)
            .map(|(resource, cost)| ResourceCost {
                resource_name: resource.name.clone(),
                cost_usd: *cost,
            })
            .collect();
        high_cost_resources.sort_by(|a, b| {
            b.cost_usd
                .partial_cmp(&a.cost_usd)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        // Per-kind averages; a single resource of a kind has no peers to
        // deviate from.
        let mut kind_totals: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
        for (resource, cost) in &costs {
            let entry = kind_totals.entry(resource.kind.as_str()).or_insert((0.0, 0));
            entry.0 += cost;
            entry.1 += 1;
        }

        let cost_anomalies: Vec<CostAnomaly> = costs
            .iter()
            .filter_map(|(resource, cost)| {
                let (sum, count) = kind_totals.get(resource.kind.as_str())?;
                if *count < 2 {
                    return None;
                }
                let average = sum / *count as f64;
                if average > 0.0 && *cost > ANOMALY_RATIO * average {
                    Some(CostAnomaly {
                        resource_name: resource.name.clone(),
                        cost_usd: *cost,
                        reason: format!(
                            "costs {:.1}x the {} average of ${:.2}",
                            cost / average,
                            resource.kind,
                            average
                        ),
                    })
                } else {
                    None
                }
            })
            .collect();

        let analysis = CostAnalysis {
            total_cost_usd,
            cost_breakdown,
            high_cost_resources,
            cost_anomalies,
            analysis_duration_seconds: 0.0,
        };

        (analysis, unpriced)
    }
}

impl Default for AnalyzerStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for AnalyzerStage {
    fn kind(&self) -> StageKind {
        StageKind::Analyze
    }

    async fn run(&self, mut ctx: SessionContext) -> SessionContext {
        let Some(scan) = ctx.latest_scan() else {
            ctx.error(StageKind::Analyze, "no scan history to analyze");
            return ctx;
        };
        let resources = scan.resources.clone();

        let started = Instant::now();
        let (mut analysis, unpriced) = Self::analyze(&resources);
        analysis.analysis_duration_seconds = started.elapsed().as_secs_f64();

        info!(
            "analyzed {} resources: ${:.2}/month, {} high-cost, {} anomalies",
            resources.len(),
            analysis.total_cost_usd,
            analysis.high_cost_resources.len(),
            analysis.cost_anomalies.len()
        );

        for kind in unpriced {
            ctx.warn(
                StageKind::Analyze,
                format!("no rate card entry for {kind}; excluded from cost totals"),
            );
        }

        ctx.record_analysis(analysis);
        ctx
    }
}
