//! Session persistence.
//!
//! Saves and loads the full session context as JSON, for checkpointing
//! and cross-invocation reuse. Writes go through a temporary file in the
//! destination directory and are renamed into place, so a partially
//! written session is never observable to a subsequent load. Loads are
//! strict: malformed input fails with an error naming the offending
//! field instead of being coerced to defaults, while fields absent from
//! older session files default to empty.

use crate::session::SessionContext;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

/// Errors from saving, loading, or normalizing session state.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to read session file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write session file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The input was not a session context at all (wrong shape, wrong
    /// type, or a missing required field). The serde message names the
    /// first offending field.
    #[error("malformed session state: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The input deserialized but violates a data-model invariant.
    #[error("invalid session state: field `{field}`: {reason}")]
    Invalid { field: String, reason: String },
}

/// Serializes the full session context to `path`.
pub fn save_session(ctx: &SessionContext, path: &Path) -> Result<(), PersistenceError> {
    let json = serde_json::to_string_pretty(ctx)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let write_err = |source| PersistenceError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp = NamedTempFile::new_in(&dir).map_err(write_err)?;
    tmp.write_all(json.as_bytes()).map_err(write_err)?;
    tmp.flush().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    debug!(
        "saved session {} to {}",
        ctx.session_id(),
        path.display()
    );
    Ok(())
}

/// Deserializes a session context from `path`.
pub fn load_session(path: &Path) -> Result<SessionContext, PersistenceError> {
    let content = fs::read_to_string(path).map_err(|source| PersistenceError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let value: serde_json::Value = serde_json::from_str(&content)?;
    normalize_session(value)
}

/// Normalizes a wire-shaped value into a typed, validated session context.
///
/// Accepts older representations that omit newer fields (histories,
/// recommendations, reports, diagnostics default to empty), but rejects
/// anything that deserializes into an invariant violation.
pub fn normalize_session(value: serde_json::Value) -> Result<SessionContext, PersistenceError> {
    let ctx: SessionContext = serde_json::from_value(value)?;
    validate(&ctx)?;
    Ok(ctx)
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> PersistenceError {
    PersistenceError::Invalid {
        field: field.into(),
        reason: reason.into(),
    }
}

fn validate(ctx: &SessionContext) -> Result<(), PersistenceError> {
    if ctx.session_id().is_empty() {
        return Err(invalid("session_id", "must not be empty"));
    }
    if ctx.subscription_id().is_empty() {
        return Err(invalid("subscription_id", "must not be empty"));
    }
    if ctx.tenant_id().is_empty() {
        return Err(invalid("tenant_id", "must not be empty"));
    }

    for (i, scan) in ctx.scan_history().iter().enumerate() {
        if scan.resources_found != scan.resources.len() {
            return Err(invalid(
                format!("scan_history[{i}].resources_found"),
                format!(
                    "count {} does not match {} resources",
                    scan.resources_found,
                    scan.resources.len()
                ),
            ));
        }
        if !scan.scan_duration_seconds.is_finite() || scan.scan_duration_seconds < 0.0 {
            return Err(invalid(
                format!("scan_history[{i}].scan_duration_seconds"),
                "must be a non-negative number",
            ));
        }
    }

    for (i, analysis) in ctx.analysis_history().iter().enumerate() {
        if !analysis.total_cost_usd.is_finite() || analysis.total_cost_usd < 0.0 {
            return Err(invalid(
                format!("analysis_history[{i}].total_cost_usd"),
                "must be a non-negative number",
            ));
        }
    }

    for (i, rec) in ctx.recommendations().iter().enumerate() {
        if !rec.estimated_savings_usd.is_finite() || rec.estimated_savings_usd < 0.0 {
            return Err(invalid(
                format!("recommendations[{i}].estimated_savings_usd"),
                "must be a non-negative number",
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CostAnalysis, CostAnomaly, Priority, Recommendation, Resource, ResourceCost,
        ResourceKind, ScanResult, StageKind,
    };
    use serde_json::json;
    use std::collections::BTreeMap;

    fn populated_context() -> SessionContext {
        let mut ctx = SessionContext::with_session_id("s-42", "sub-1", "ten-1");

        let mut vm = Resource::new(ResourceKind::VirtualMachine, "vm-web-01");
        vm.location = Some("westeurope".to_string());
        vm.attributes
            .insert("vm_size".to_string(), json!("Standard_D8s_v3"));
        ctx.record_scan(ScanResult::new("sub-1", vec![vm], 2.4));

        ctx.record_analysis(CostAnalysis {
            total_cost_usd: 420.0,
            cost_breakdown: BTreeMap::from([("virtual_machine".to_string(), 420.0)]),
            high_cost_resources: vec![ResourceCost {
                resource_name: "vm-web-01".to_string(),
                cost_usd: 420.0,
            }],
            cost_anomalies: vec![CostAnomaly {
                resource_name: "vm-web-01".to_string(),
                cost_usd: 420.0,
                reason: "costs 2.0x the virtual_machine average".to_string(),
            }],
            analysis_duration_seconds: 0.8,
        });

        ctx.set_recommendations(vec![Recommendation {
            title: "Rightsize vm-web-01".to_string(),
            description: "Oversized for observed load".to_string(),
            estimated_savings_usd: 120.0,
            priority: Priority::High,
            implementation_effort: "Medium".to_string(),
            implementation_steps: vec!["Resize to Standard_D4s_v3".to_string()],
        }]);

        ctx.set_reports(BTreeMap::from([(
            "executive_summary".to_string(),
            json!({"overview": {"total_resources": 1}}),
        )]));

        ctx.warn(StageKind::Analyze, "no rate card entry for key_vault");
        ctx.error(StageKind::Scan, "page 3 fetch failed");

        ctx
    }

    #[test]
    fn test_round_trip_preserves_every_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let ctx = populated_context();
        save_session(&ctx, &path).unwrap();
        let loaded = load_session(&path).unwrap();

        assert_eq!(loaded, ctx);
    }

    #[test]
    fn test_round_trip_of_empty_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let ctx = SessionContext::with_session_id("s-1", "sub-1", "ten-1");
        save_session(&ctx, &path).unwrap();
        let loaded = load_session(&path).unwrap();

        assert_eq!(loaded, ctx);
        assert!(loaded.scan_history().is_empty());
        assert!(loaded.diagnostics().is_empty());
    }

    #[test]
    fn test_save_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        save_session(&populated_context(), &path).unwrap();
        let newer = SessionContext::with_session_id("s-2", "sub-1", "ten-1");
        save_session(&newer, &path).unwrap();

        assert_eq!(load_session(&path).unwrap().session_id(), "s-2");
    }

    #[test]
    fn test_load_tolerates_omitted_newer_fields() {
        let value = json!({
            "session_id": "s-old",
            "subscription_id": "sub-1",
            "tenant_id": "ten-1"
        });

        let ctx = normalize_session(value).unwrap();
        assert_eq!(ctx.session_id(), "s-old");
        assert!(ctx.scan_history().is_empty());
        assert!(ctx.recommendations().is_empty());
        assert!(ctx.reports().is_empty());
    }

    #[test]
    fn test_missing_required_field_is_named() {
        let value = json!({
            "subscription_id": "sub-1",
            "tenant_id": "ten-1"
        });

        let err = normalize_session(value).unwrap_err();
        assert!(err.to_string().contains("session_id"), "{err}");
    }

    #[test]
    fn test_count_mismatch_is_rejected_with_field_name() {
        let value = json!({
            "session_id": "s-1",
            "subscription_id": "sub-1",
            "tenant_id": "ten-1",
            "scan_history": [{
                "subscription_id": "sub-1",
                "resources": [],
                "resources_found": 5,
                "scan_duration_seconds": 1.0,
                "completed_at": "2026-01-01T00:00:00Z"
            }]
        });

        let err = normalize_session(value).unwrap_err();
        assert!(
            err.to_string()
                .contains("scan_history[0].resources_found"),
            "{err}"
        );
    }

    #[test]
    fn test_negative_cost_is_rejected() {
        let value = json!({
            "session_id": "s-1",
            "subscription_id": "sub-1",
            "tenant_id": "ten-1",
            "analysis_history": [{
                "total_cost_usd": -3.0,
                "cost_breakdown": {},
                "high_cost_resources": [],
                "cost_anomalies": [],
                "analysis_duration_seconds": 0.1
            }]
        });

        let err = normalize_session(value).unwrap_err();
        assert!(
            err.to_string().contains("total_cost_usd"),
            "{err}"
        );
    }

    #[test]
    fn test_non_object_input_is_malformed() {
        let err = normalize_session(json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, PersistenceError::Malformed(_)));
    }
}
