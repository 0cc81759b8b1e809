//! Report file generation.
//!
//! Renders an accumulated session into the on-disk report formats: a
//! complete JSON export, a Markdown executive summary, and CSV cost
//! rows. The reporter stage assembles the report *documents*; this
//! module only formats what the session already holds.

use crate::analysis::views;
use crate::models::DiagnosticLevel;
use crate::session::SessionContext;
use anyhow::Result;
use chrono::Utc;

/// Generate the complete JSON export of the session.
pub fn generate_json_export(ctx: &SessionContext) -> Result<String> {
    Ok(serde_json::to_string_pretty(ctx)?)
}

/// Generate the Markdown executive summary.
pub fn generate_markdown_summary(ctx: &SessionContext) -> String {
    let mut output = String::new();

    output.push_str("# Cost Optimization Report\n\n");
    output.push_str(&generate_metadata_section(ctx));
    output.push_str(&generate_cost_section(ctx));
    output.push_str(&generate_recommendations_section(ctx));
    output.push_str(&generate_diagnostics_section(ctx));
    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(ctx: &SessionContext) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Session:** `{}`\n", ctx.session_id()));
    section.push_str(&format!("- **Subscription:** `{}`\n", ctx.subscription_id()));
    section.push_str(&format!("- **Tenant:** `{}`\n", ctx.tenant_id()));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if let Some(scan) = ctx.latest_scan() {
        section.push_str(&format!(
            "- **Resources Scanned:** {} (in {:.1}s)\n",
            scan.resources_found, scan.scan_duration_seconds
        ));
    }
    section.push('\n');

    section
}

fn generate_cost_section(ctx: &SessionContext) -> String {
    let Some(analysis) = ctx.latest_analysis() else {
        return String::new();
    };

    let mut section = String::new();

    section.push_str("## Cost Summary\n\n");
    section.push_str(&format!(
        "Estimated total monthly cost: **${:.2}**\n\n",
        analysis.total_cost_usd
    ));

    if !analysis.cost_breakdown.is_empty() {
        section.push_str("| Resource Kind | Monthly Cost |\n");
        section.push_str("|:---|---:|\n");
        for (kind, cost) in &analysis.cost_breakdown {
            section.push_str(&format!("| {} | ${:.2} |\n", kind, cost));
        }
        section.push('\n');
    }

    if !analysis.high_cost_resources.is_empty() {
        section.push_str("### High-Cost Resources (>$100/month)\n\n");
        for entry in &analysis.high_cost_resources {
            section.push_str(&format!(
                "- **{}**: ${:.2}/month\n",
                entry.resource_name, entry.cost_usd
            ));
        }
        section.push('\n');
    }

    if !analysis.cost_anomalies.is_empty() {
        section.push_str("### Cost Anomalies\n\n");
        for anomaly in &analysis.cost_anomalies {
            section.push_str(&format!(
                "- **{}** (${:.2}/month): {}\n",
                anomaly.resource_name, anomaly.cost_usd, anomaly.reason
            ));
        }
        section.push('\n');
    }

    section
}

fn generate_recommendations_section(ctx: &SessionContext) -> String {
    if ctx.recommendations().is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Recommendations\n\n");
    section.push_str(&format!(
        "Total savings potential: **${:.2}/month** across {} recommendations.\n\n",
        views::total_savings_potential(ctx),
        ctx.recommendations().len()
    ));

    for (i, rec) in ctx.recommendations().iter().enumerate() {
        section.push_str(&format!(
            "### {}. {} {}\n\n",
            i + 1,
            rec.priority.emoji(),
            rec.title
        ));
        section.push_str(&format!(
            "- **Savings:** ${:.2}/month\n- **Priority:** {}\n- **Effort:** {}\n\n",
            rec.estimated_savings_usd, rec.priority, rec.implementation_effort
        ));
        if !rec.description.is_empty() {
            section.push_str(&format!("{}\n\n", rec.description));
        }
        if !rec.implementation_steps.is_empty() {
            for (n, step) in rec.implementation_steps.iter().enumerate() {
                section.push_str(&format!("{}. {}\n", n + 1, step));
            }
            section.push('\n');
        }
    }

    section
}

fn generate_diagnostics_section(ctx: &SessionContext) -> String {
    if ctx.diagnostics().is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Diagnostics\n\n");
    for diagnostic in ctx.diagnostics() {
        let marker = match diagnostic.level {
            DiagnosticLevel::Error => "❌",
            DiagnosticLevel::Warning => "⚠️",
        };
        section.push_str(&format!("- {} {}\n", marker, diagnostic));
    }
    section.push('\n');

    section
}

fn generate_footer() -> String {
    format!(
        "---\n\n*Generated by costpilot v{}*\n",
        env!("CARGO_PKG_VERSION")
    )
}

/// Generate CSV rows for the latest cost analysis.
///
/// One row per breakdown kind and per high-cost resource.
pub fn generate_cost_csv(ctx: &SessionContext) -> String {
    let mut output = String::from("record,name,monthly_cost_usd\n");

    if let Some(analysis) = ctx.latest_analysis() {
        for (kind, cost) in &analysis.cost_breakdown {
            output.push_str(&format!("breakdown,{},{:.2}\n", csv_field(kind), cost));
        }
        for entry in &analysis.high_cost_resources {
            output.push_str(&format!(
                "high_cost,{},{:.2}\n",
                csv_field(&entry.resource_name),
                entry.cost_usd
            ));
        }
    }

    output
}

/// Quotes a CSV field when it contains a delimiter or quote.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CostAnalysis, Priority, Recommendation, Resource, ResourceCost, ResourceKind, ScanResult,
        StageKind,
    };
    use std::collections::BTreeMap;

    fn populated_context() -> SessionContext {
        let mut ctx = SessionContext::with_session_id("s-1", "sub-1", "ten-1");
        ctx.record_scan(ScanResult::new(
            "sub-1",
            vec![Resource::new(ResourceKind::VirtualMachine, "vm-1")],
            0.4,
        ));
        ctx.record_analysis(CostAnalysis {
            total_cost_usd: 170.0,
            cost_breakdown: BTreeMap::from([("virtual_machine".to_string(), 170.0)]),
            high_cost_resources: vec![ResourceCost {
                resource_name: "vm-1".to_string(),
                cost_usd: 170.0,
            }],
            cost_anomalies: Vec::new(),
            analysis_duration_seconds: 0.1,
        });
        ctx.set_recommendations(vec![Recommendation {
            title: "Rightsize vm-1".to_string(),
            description: "Oversized".to_string(),
            estimated_savings_usd: 51.0,
            priority: Priority::High,
            implementation_effort: "Medium".to_string(),
            implementation_steps: vec!["Resize".to_string()],
        }]);
        ctx.warn(StageKind::Analyze, "sample warning");
        ctx
    }

    #[test]
    fn test_markdown_summary_contains_sections() {
        let markdown = generate_markdown_summary(&populated_context());

        assert!(markdown.contains("# Cost Optimization Report"));
        assert!(markdown.contains("## Cost Summary"));
        assert!(markdown.contains("$170.00"));
        assert!(markdown.contains("Rightsize vm-1"));
        assert!(markdown.contains("## Diagnostics"));
    }

    #[test]
    fn test_markdown_summary_of_empty_session_has_no_cost_section() {
        let ctx = SessionContext::with_session_id("s-1", "sub-1", "ten-1");
        let markdown = generate_markdown_summary(&ctx);

        assert!(markdown.contains("## Metadata"));
        assert!(!markdown.contains("## Cost Summary"));
        assert!(!markdown.contains("## Recommendations"));
    }

    #[test]
    fn test_csv_rows_cover_breakdown_and_high_cost() {
        let csv = generate_cost_csv(&populated_context());
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "record,name,monthly_cost_usd");
        assert!(lines.contains(&"breakdown,virtual_machine,170.00"));
        assert!(lines.contains(&"high_cost,vm-1,170.00"));
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_json_export_parses_back() {
        let ctx = populated_context();
        let json = generate_json_export(&ctx).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["session_id"], "s-1");
    }
}
