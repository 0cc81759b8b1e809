//! Derived aggregate views over the session context.
//!
//! Pure functions, recomputed on demand from the live context; nothing
//! here is cached or maintained incrementally, so the results are always
//! consistent with the fields at call time.

use crate::models::{Priority, Recommendation};
use crate::session::SessionContext;
use std::collections::BTreeMap;

/// Total estimated monthly savings across the current recommendations.
///
/// Returns 0.0 when there are no recommendations.
pub fn total_savings_potential(ctx: &SessionContext) -> f64 {
    ctx.recommendations()
        .iter()
        .map(|r| r.estimated_savings_usd)
        .sum()
}

/// Recommendations at the highest priority present, in original order.
///
/// An order-preserving subsequence of the current recommendations; empty
/// when there are no recommendations.
pub fn high_priority_recommendations(ctx: &SessionContext) -> Vec<&Recommendation> {
    let Some(max) = ctx.recommendations().iter().map(|r| r.priority).max() else {
        return Vec::new();
    };

    ctx.recommendations()
        .iter()
        .filter(|r| r.priority == max)
        .collect()
}

/// Recommendation counts per priority.
pub fn recommendation_summary(ctx: &SessionContext) -> BTreeMap<Priority, usize> {
    let mut counts = BTreeMap::new();
    for rec in ctx.recommendations() {
        *counts.entry(rec.priority).or_insert(0) += 1;
    }
    counts
}

/// The top `n` recommendations by estimated savings, highest first.
///
/// Ties keep their original relative order.
pub fn top_recommendations(ctx: &SessionContext, n: usize) -> Vec<&Recommendation> {
    let mut recs: Vec<&Recommendation> = ctx.recommendations().iter().collect();
    recs.sort_by(|a, b| {
        b.estimated_savings_usd
            .partial_cmp(&a.estimated_savings_usd)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    recs.truncate(n);
    recs
}

/// Resource counts per kind for the most recent scan.
///
/// Empty when there is no scan history.
pub fn resource_distribution(ctx: &SessionContext) -> BTreeMap<String, usize> {
    let mut dist = BTreeMap::new();

    if let Some(scan) = ctx.latest_scan() {
        for resource in &scan.resources {
            *dist.entry(resource.kind.as_str().to_string()).or_insert(0) += 1;
        }
    }

    dist
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Resource, ResourceKind, ScanResult};

    fn rec(title: &str, savings: f64, priority: Priority) -> Recommendation {
        Recommendation {
            title: title.to_string(),
            description: "test".to_string(),
            estimated_savings_usd: savings,
            priority,
            implementation_effort: "Low".to_string(),
            implementation_steps: Vec::new(),
        }
    }

    #[test]
    fn test_total_savings_empty_is_zero() {
        let ctx = SessionContext::with_session_id("s-1", "sub-1", "ten-1");
        assert_eq!(total_savings_potential(&ctx), 0.0);
    }

    #[test]
    fn test_total_savings_sums_recommendations() {
        let mut ctx = SessionContext::with_session_id("s-1", "sub-1", "ten-1");
        ctx.set_recommendations(vec![
            rec("rightsize", 300.0, Priority::High),
            rec("cleanup", 50.0, Priority::Low),
        ]);
        assert_eq!(total_savings_potential(&ctx), 350.0);
    }

    #[test]
    fn test_high_priority_filters_to_max_present() {
        let mut ctx = SessionContext::with_session_id("s-1", "sub-1", "ten-1");
        ctx.set_recommendations(vec![
            rec("rightsize", 300.0, Priority::High),
            rec("cleanup", 50.0, Priority::Low),
        ]);

        let high = high_priority_recommendations(&ctx);
        assert_eq!(high.len(), 1);
        assert_eq!(high[0].title, "rightsize");
    }

    #[test]
    fn test_high_priority_uses_max_present_not_absolute_high() {
        let mut ctx = SessionContext::with_session_id("s-1", "sub-1", "ten-1");
        ctx.set_recommendations(vec![
            rec("a", 10.0, Priority::Medium),
            rec("b", 20.0, Priority::Low),
            rec("c", 30.0, Priority::Medium),
        ]);

        let high = high_priority_recommendations(&ctx);
        assert_eq!(high.len(), 2);
        // Original order preserved.
        assert_eq!(high[0].title, "a");
        assert_eq!(high[1].title, "c");
    }

    #[test]
    fn test_high_priority_empty_recommendations() {
        let ctx = SessionContext::with_session_id("s-1", "sub-1", "ten-1");
        assert!(high_priority_recommendations(&ctx).is_empty());
    }

    #[test]
    fn test_views_track_live_recommendations() {
        let mut ctx = SessionContext::with_session_id("s-1", "sub-1", "ten-1");
        ctx.set_recommendations(vec![rec("old", 100.0, Priority::Low)]);
        assert_eq!(total_savings_potential(&ctx), 100.0);

        ctx.set_recommendations(vec![rec("new", 40.0, Priority::High)]);
        assert_eq!(total_savings_potential(&ctx), 40.0);
        assert_eq!(high_priority_recommendations(&ctx)[0].title, "new");
    }

    #[test]
    fn test_top_recommendations_sorted_by_savings() {
        let mut ctx = SessionContext::with_session_id("s-1", "sub-1", "ten-1");
        ctx.set_recommendations(vec![
            rec("small", 10.0, Priority::Low),
            rec("large", 500.0, Priority::High),
            rec("medium", 80.0, Priority::Medium),
        ]);

        let top = top_recommendations(&ctx, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].title, "large");
        assert_eq!(top[1].title, "medium");
    }

    #[test]
    fn test_resource_distribution_uses_latest_scan() {
        let mut ctx = SessionContext::with_session_id("s-1", "sub-1", "ten-1");
        ctx.record_scan(ScanResult::new(
            "sub-1",
            vec![Resource::new(ResourceKind::VirtualMachine, "vm-old")],
            0.1,
        ));
        ctx.record_scan(ScanResult::new(
            "sub-1",
            vec![
                Resource::new(ResourceKind::StorageAccount, "stlogs"),
                Resource::new(ResourceKind::StorageAccount, "stbackups"),
                Resource::new(ResourceKind::VirtualMachine, "vm-new"),
            ],
            0.2,
        ));

        let dist = resource_distribution(&ctx);
        assert_eq!(dist.get("storage_account"), Some(&2));
        assert_eq!(dist.get("virtual_machine"), Some(&1));
    }
}
