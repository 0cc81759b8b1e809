//! The session context threaded through the pipeline.
//!
//! One `SessionContext` exists per pipeline run. Each stage receives
//! ownership, mutates it through the methods here, and hands it to the
//! next stage. Histories are append-only; recommendations and reports
//! are replaced wholesale by their producing stage.

use crate::models::{
    CostAnalysis, Diagnostic, DiagnosticLevel, Recommendation, ScanResult, StageKind,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Mutable state for one pipeline run.
///
/// Identity fields are immutable after construction. The context is not
/// thread-safe; concurrent runs must each use their own instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    session_id: String,
    subscription_id: String,
    tenant_id: String,
    /// Completed scans, oldest first.
    #[serde(default)]
    scan_history: Vec<ScanResult>,
    /// Completed cost analyses, oldest first.
    #[serde(default)]
    analysis_history: Vec<CostAnalysis>,
    /// Current recommendations; replaced by each optimizer run.
    #[serde(default)]
    recommendations: Vec<Recommendation>,
    /// Report documents by name; replaced by each reporter run.
    #[serde(default)]
    reports: BTreeMap<String, serde_json::Value>,
    /// Diagnostics accumulated across all stages, never cleared mid-run.
    #[serde(default)]
    diagnostics: Vec<Diagnostic>,
}

impl SessionContext {
    /// Creates a context with a fresh session id and empty histories.
    pub fn new(subscription_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self::with_session_id(Uuid::new_v4().to_string(), subscription_id, tenant_id)
    }

    /// Creates a context with an explicit session id.
    pub fn with_session_id(
        session_id: impl Into<String>,
        subscription_id: impl Into<String>,
        tenant_id: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            subscription_id: subscription_id.into(),
            tenant_id: tenant_id.into(),
            scan_history: Vec::new(),
            analysis_history: Vec::new(),
            recommendations: Vec::new(),
            reports: BTreeMap::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn scan_history(&self) -> &[ScanResult] {
        &self.scan_history
    }

    pub fn analysis_history(&self) -> &[CostAnalysis] {
        &self.analysis_history
    }

    pub fn recommendations(&self) -> &[Recommendation] {
        &self.recommendations
    }

    pub fn reports(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.reports
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Most recent scan, if any.
    pub fn latest_scan(&self) -> Option<&ScanResult> {
        self.scan_history.last()
    }

    /// Most recent cost analysis, if any.
    pub fn latest_analysis(&self) -> Option<&CostAnalysis> {
        self.analysis_history.last()
    }

    /// Error-level diagnostics, in recording order.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.level == DiagnosticLevel::Error)
    }

    /// Warning-level diagnostics, in recording order.
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.level == DiagnosticLevel::Warning)
    }

    /// Appends a completed scan to the history.
    pub fn record_scan(&mut self, scan: ScanResult) {
        self.scan_history.push(scan);
    }

    /// Appends a completed cost analysis to the history.
    pub fn record_analysis(&mut self, analysis: CostAnalysis) {
        self.analysis_history.push(analysis);
    }

    /// Replaces the current recommendations.
    pub fn set_recommendations(&mut self, recommendations: Vec<Recommendation>) {
        self.recommendations = recommendations;
    }

    /// Replaces the current report documents.
    pub fn set_reports(&mut self, reports: BTreeMap<String, serde_json::Value>) {
        self.reports = reports;
    }

    /// Records an error-level diagnostic.
    pub fn error(&mut self, stage: StageKind, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::error(stage, message));
    }

    /// Records a warning-level diagnostic.
    pub fn warn(&mut self, stage: StageKind, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::warning(stage, message));
    }
}
