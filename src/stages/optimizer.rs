//! Optimizer stage.
//!
//! Turns the most recent cost analysis and scan into concrete
//! optimization recommendations. Rules cover stopped-but-billed VMs,
//! unattached disks, idle public IPs, premium storage tiers, oversized
//! high-cost resources, and anomalous spend. Each run replaces the
//! session's recommendation list wholesale.

use crate::models::{CostAnalysis, Priority, Recommendation, Resource, ResourceKind, StageKind};
use crate::pipeline::Stage;
use crate::session::SessionContext;
use crate::stages::analyzer::estimate_monthly_cost;
use async_trait::async_trait;
use std::collections::BTreeSet;
use tracing::info;

/// Rightsizing a resource is assumed to recover this share of its cost.
const RIGHTSIZE_SAVINGS_RATIO: f64 = 0.3;

/// High-cost resources above this bill get a high-priority rightsizing
/// recommendation instead of a medium one.
const RIGHTSIZE_URGENT_USD: f64 = 500.0;

fn rounded(cost: f64) -> f64 {
    (cost * 100.0).round() / 100.0
}

/// Optimizer stage: rule-based recommendation generation.
pub struct OptimizerStage;

impl OptimizerStage {
    pub fn new() -> Self {
        Self
    }

    fn recommend(resources: &[Resource], analysis: &CostAnalysis) -> Vec<Recommendation> {
        let mut recommendations = Vec::new();
        // Resources already covered by a shutdown/cleanup rule; skip
        // rightsizing those.
        let mut covered: BTreeSet<&str> = BTreeSet::new();

        for resource in resources {
            let estimate = estimate_monthly_cost(resource).unwrap_or(0.0);

            match &resource.kind {
                ResourceKind::VirtualMachine => {
                    let state = resource.attribute_str("power_state").unwrap_or("");
                    if state.eq_ignore_ascii_case("stopped") {
                        covered.insert(resource.name.as_str());
                        recommendations.push(Recommendation {
                            title: format!("Deallocate stopped VM {}", resource.name),
                            description: format!(
                                "{} is stopped but still allocated, so compute charges \
                                 continue to accrue. Deallocating releases the compute \
                                 reservation while keeping disks intact.",
                                resource.name
                            ),
                            estimated_savings_usd: rounded(estimate * 0.85),
                            priority: Priority::High,
                            implementation_effort: "Low".to_string(),
                            implementation_steps: vec![
                                format!("Confirm {} is not needed short-term", resource.name),
                                "Deallocate the VM from the portal or CLI".to_string(),
                                "Set up auto-shutdown to prevent recurrence".to_string(),
                            ],
                        });
                    }
                }
                ResourceKind::ManagedDisk => {
                    let unattached = resource
                        .attribute_str("disk_state")
                        .map(|s| s.eq_ignore_ascii_case("unattached"))
                        .unwrap_or_else(|| !resource.attributes.contains_key("managed_by"));
                    if unattached {
                        covered.insert(resource.name.as_str());
                        recommendations.push(Recommendation {
                            title: format!("Delete unattached disk {}", resource.name),
                            description: format!(
                                "{} is not attached to any VM and is billed for its full \
                                 provisioned size.",
                                resource.name
                            ),
                            estimated_savings_usd: rounded(estimate),
                            priority: Priority::Medium,
                            implementation_effort: "Low".to_string(),
                            implementation_steps: vec![
                                "Snapshot the disk if its data may be needed".to_string(),
                                format!("Delete {}", resource.name),
                            ],
                        });
                    }
                }
                ResourceKind::PublicIpAddress => {
                    if !resource.attributes.contains_key("ip_configuration") {
                        covered.insert(resource.name.as_str());
                        recommendations.push(Recommendation {
                            title: format!("Release idle public IP {}", resource.name),
                            description: format!(
                                "{} is not associated with any network interface or load \
                                 balancer.",
                                resource.name
                            ),
                            estimated_savings_usd: rounded(estimate),
                            priority: Priority::Low,
                            implementation_effort: "Low".to_string(),
                            implementation_steps: vec![format!("Release {}", resource.name)],
                        });
                    }
                }
                ResourceKind::StorageAccount => {
                    let premium = resource
                        .attribute_str("sku_tier")
                        .map(|t| t.eq_ignore_ascii_case("premium"))
                        .unwrap_or(false);
                    if premium {
                        recommendations.push(Recommendation {
                            title: format!("Review Premium tier for {}", resource.name),
                            description: format!(
                                "{} uses Premium storage. Workloads without strict latency \
                                 needs usually run fine on Standard.",
                                resource.name
                            ),
                            estimated_savings_usd: rounded(estimate * 0.4),
                            priority: Priority::Medium,
                            implementation_effort: "Medium".to_string(),
                            implementation_steps: vec![
                                "Check IOPS and latency requirements".to_string(),
                                format!("Migrate {} to a Standard sku if acceptable", resource.name),
                            ],
                        });
                    }
                }
                _ => {}
            }
        }

        for high_cost in &analysis.high_cost_resources {
            if covered.contains(high_cost.resource_name.as_str()) {
                continue;
            }
            let priority = if high_cost.cost_usd >= RIGHTSIZE_URGENT_USD {
                Priority::High
            } else {
                Priority::Medium
            };
            recommendations.push(Recommendation {
                title: format!("Rightsize {}", high_cost.resource_name),
                description: format!(
                    "{} costs ${:.2}/month, above the ${:.0}/month high-cost threshold. \
                     Review utilization and move to a smaller size or tier.",
                    high_cost.resource_name,
                    high_cost.cost_usd,
                    crate::models::HIGH_COST_THRESHOLD_USD
                ),
                estimated_savings_usd: rounded(high_cost.cost_usd * RIGHTSIZE_SAVINGS_RATIO),
                priority,
                implementation_effort: "Medium".to_string(),
                implementation_steps: vec![
                    "Review 30-day utilization metrics".to_string(),
                    "Pick the smallest size meeting peak demand".to_string(),
                    format!("Resize {} in a maintenance window", high_cost.resource_name),
                ],
            });
        }

        for anomaly in &analysis.cost_anomalies {
            recommendations.push(Recommendation {
                title: format!("Investigate anomalous spend on {}", anomaly.resource_name),
                description: format!(
                    "{} ({}: ${:.2}/month)",
                    anomaly.reason, anomaly.resource_name, anomaly.cost_usd
                ),
                estimated_savings_usd: 0.0,
                priority: Priority::High,
                implementation_effort: "Low".to_string(),
                implementation_steps: vec![
                    "Compare configuration against peer resources".to_string(),
                    "Confirm the spend is intentional or open a rightsizing task".to_string(),
                ],
            });
        }

        recommendations.sort_by(|a, b| {
            b.estimated_savings_usd
                .partial_cmp(&a.estimated_savings_usd)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        recommendations
    }
}

impl Default for OptimizerStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for OptimizerStage {
    fn kind(&self) -> StageKind {
        StageKind::Optimize
    }

    async fn run(&self, mut ctx: SessionContext) -> SessionContext {
        let Some(analysis) = ctx.latest_analysis() else {
            ctx.error(StageKind::Optimize, "no cost analysis to optimize against");
            return ctx;
        };
        let analysis = analysis.clone();
        let resources = ctx
            .latest_scan()
            .map(|scan| scan.resources.clone())
            .unwrap_or_default();

        let recommendations = Self::recommend(&resources, &analysis);

        if recommendations.is_empty() {
            info!("no optimization opportunities found");
        } else {
            info!("generated {} recommendations", recommendations.len());
        }

        ctx.set_recommendations(recommendations);
        ctx
    }
}
