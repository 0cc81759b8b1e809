//! Reporter stage.
//!
//! Assembles the session's accumulated history into named report
//! documents: an executive summary, the full recommendation list, and
//! an action-item split. The documents are stored on the session as
//! opaque JSON values; rendering them to disk is the report module's
//! job, not this stage's.

use crate::analysis::views;
use crate::models::{Priority, StageKind};
use crate::pipeline::Stage;
use crate::session::SessionContext;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::info;

/// Reporter stage: report document assembly.
pub struct ReporterStage;

impl ReporterStage {
    pub fn new() -> Self {
        Self
    }

    fn executive_summary(ctx: &SessionContext) -> serde_json::Value {
        let total_resources = ctx
            .latest_scan()
            .map(|scan| scan.resources_found)
            .unwrap_or(0);
        let total_cost = ctx
            .latest_analysis()
            .map(|analysis| analysis.total_cost_usd)
            .unwrap_or(0.0);
        let cost_breakdown = ctx
            .latest_analysis()
            .map(|analysis| analysis.cost_breakdown.clone())
            .unwrap_or_default();

        let mut key_findings = Vec::new();
        if let Some(analysis) = ctx.latest_analysis() {
            if !analysis.high_cost_resources.is_empty() {
                key_findings.push(format!(
                    "{} resources exceed $100/month",
                    analysis.high_cost_resources.len()
                ));
            }
            if !analysis.cost_anomalies.is_empty() {
                key_findings.push(format!(
                    "{} cost anomalies detected",
                    analysis.cost_anomalies.len()
                ));
            }
        }
        let savings = views::total_savings_potential(ctx);
        if savings > 0.0 {
            key_findings.push(format!(
                "${savings:.2}/month of savings potential identified"
            ));
        }
        if total_resources == 0 && ctx.latest_scan().is_some() {
            key_findings.push("the scanned subscription contains no resources".to_string());
        }

        json!({
            "generated_at": Utc::now(),
            "session": {
                "session_id": ctx.session_id(),
                "subscription_id": ctx.subscription_id(),
                "tenant_id": ctx.tenant_id(),
            },
            "overview": {
                "total_resources": total_resources,
                "resource_distribution": views::resource_distribution(ctx),
            },
            "financial_impact": {
                "total_monthly_cost_usd": total_cost,
                "cost_breakdown": cost_breakdown,
            },
            "recommendations_summary": Self::recommendation_summary(ctx),
            "key_findings": key_findings,
        })
    }

    fn recommendation_summary(ctx: &SessionContext) -> serde_json::Value {
        json!({
            "total_recommendations": ctx.recommendations().len(),
            "high_priority_count": views::high_priority_recommendations(ctx).len(),
            "total_potential_savings_usd": views::total_savings_potential(ctx),
            "priority_distribution": views::recommendation_summary(ctx),
        })
    }

    fn optimization_recommendations(ctx: &SessionContext) -> serde_json::Value {
        json!({
            "summary": Self::recommendation_summary(ctx),
            "recommendations": ctx.recommendations(),
        })
    }

    fn action_items(ctx: &SessionContext) -> serde_json::Value {
        let action = |rec: &crate::models::Recommendation| {
            json!({
                "title": rec.title,
                "estimated_savings_usd": rec.estimated_savings_usd,
                "implementation_effort": rec.implementation_effort,
            })
        };

        let immediate: Vec<_> = ctx
            .recommendations()
            .iter()
            .filter(|r| r.priority == Priority::High)
            .map(action)
            .collect();
        let follow_up: Vec<_> = ctx
            .recommendations()
            .iter()
            .filter(|r| r.priority != Priority::High)
            .map(action)
            .collect();

        json!({
            "immediate_actions": immediate,
            "follow_up_actions": follow_up,
        })
    }
}

impl Default for ReporterStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for ReporterStage {
    fn kind(&self) -> StageKind {
        StageKind::Report
    }

    async fn run(&self, mut ctx: SessionContext) -> SessionContext {
        if ctx.scan_history().is_empty()
            && ctx.analysis_history().is_empty()
            && ctx.recommendations().is_empty()
        {
            ctx.warn(
                StageKind::Report,
                "nothing to report: session has no scan, analysis, or recommendations",
            );
            ctx.set_reports(BTreeMap::new());
            return ctx;
        }

        let reports = BTreeMap::from([
            (
                "executive_summary".to_string(),
                Self::executive_summary(&ctx),
            ),
            (
                "optimization_recommendations".to_string(),
                Self::optimization_recommendations(&ctx),
            ),
            ("action_items".to_string(), Self::action_items(&ctx)),
        ]);

        info!("assembled {} report documents", reports.len());
        ctx.set_reports(reports);
        ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Recommendation, Resource, ResourceKind, ScanResult};

    fn rec(title: &str, savings: f64, priority: Priority) -> Recommendation {
        Recommendation {
            title: title.to_string(),
            description: String::new(),
            estimated_savings_usd: savings,
            priority,
            implementation_effort: "Low".to_string(),
            implementation_steps: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_empty_session_reports_nothing_with_warning() {
        let ctx = SessionContext::with_session_id("s-1", "sub-1", "ten-1");

        let out = ReporterStage::new().run(ctx).await;

        assert!(out.reports().is_empty());
        assert_eq!(out.warnings().count(), 1);
    }

    #[tokio::test]
    async fn test_reports_contain_expected_documents() {
        let mut ctx = SessionContext::with_session_id("s-1", "sub-1", "ten-1");
        ctx.record_scan(ScanResult::new(
            "sub-1",
            vec![Resource::new(ResourceKind::VirtualMachine, "vm-1")],
            0.2,
        ));
        ctx.set_recommendations(vec![
            rec("rightsize", 300.0, Priority::High),
            rec("cleanup", 50.0, Priority::Low),
        ]);

        let out = ReporterStage::new().run(ctx).await;

        assert!(out.reports().contains_key("executive_summary"));
        assert!(out.reports().contains_key("optimization_recommendations"));
        assert!(out.reports().contains_key("action_items"));

        let summary = &out.reports()["executive_summary"];
        assert_eq!(summary["overview"]["total_resources"], 1);
        assert_eq!(
            summary["recommendations_summary"]["total_potential_savings_usd"],
            350.0
        );

        let actions = &out.reports()["action_items"];
        assert_eq!(actions["immediate_actions"].as_array().unwrap().len(), 1);
        assert_eq!(actions["follow_up_actions"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_scan_only_session_still_reports() {
        let mut ctx = SessionContext::with_session_id("s-1", "sub-1", "ten-1");
        ctx.record_scan(ScanResult::new("sub-1", Vec::new(), 0.1));

        let out = ReporterStage::new().run(ctx).await;

        let summary = &out.reports()["executive_summary"];
        assert_eq!(summary["overview"]["total_resources"], 0);
        assert_eq!(summary["financial_impact"]["total_monthly_cost_usd"], 0.0);
    }

    #[tokio::test]
    async fn test_rerun_replaces_reports() {
        let mut ctx = SessionContext::with_session_id("s-1", "sub-1", "ten-1");
        ctx.set_recommendations(vec![rec("one", 10.0, Priority::Low)]);

        let stage = ReporterStage::new();
        let mut out = stage.run(ctx).await;
        out.set_recommendations(vec![rec("two", 99.0, Priority::High)]);
        let out = stage.run(out).await;

        let doc = &out.reports()["optimization_recommendations"];
        assert_eq!(doc["summary"]["total_recommendations"], 1);
        assert_eq!(doc["recommendations"][0]["title"], "two");
    }
}
