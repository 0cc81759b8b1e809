//! Pipeline runner and the stage contract.
//!
//! Stages run in a fixed dependency order: scan, analyze, optimize,
//! report. The runner checks each stage's precondition before invoking
//! it; when a precondition fails the remaining pipeline is halted
//! without raising, and the caller inspects the returned context's
//! histories and diagnostics to detect the short-circuit.

use crate::models::StageKind;
use crate::session::SessionContext;
use async_trait::async_trait;
use tracing::{debug, info};

/// A single pipeline stage.
///
/// A stage consumes the session context and returns the updated context.
/// The signature is infallible on purpose: internal failures must be
/// recorded as diagnostics on the context, not propagated.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Which phase of the pipeline this stage implements.
    fn kind(&self) -> StageKind;

    /// Runs the stage to completion.
    async fn run(&self, ctx: SessionContext) -> SessionContext;
}

/// Returns whether `kind` may run against the current context.
///
/// - analyze consumes the most recent scan, so it needs one;
/// - optimize consumes the most recent analysis, so it needs one;
/// - scan and report have no hard precondition.
pub fn precondition_met(kind: StageKind, ctx: &SessionContext) -> bool {
    match kind {
        StageKind::Scan | StageKind::Report => true,
        StageKind::Analyze => !ctx.scan_history().is_empty(),
        StageKind::Optimize => !ctx.analysis_history().is_empty(),
    }
}

/// Sequences stages over a single session context.
///
/// Each stage is awaited to completion before the next starts; the
/// context moves stage-to-stage with a single owner at any time.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    /// Creates a pipeline over an ordered list of stages.
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    /// Runs the stages in order, halting silently on a failed precondition.
    pub async fn run(&self, mut ctx: SessionContext) -> SessionContext {
        for stage in &self.stages {
            let kind = stage.kind();

            if !precondition_met(kind, &ctx) {
                debug!(
                    "halting pipeline: {} stage precondition not met (session {})",
                    kind,
                    ctx.session_id()
                );
                break;
            }

            info!("running {} stage (session {})", kind, ctx.session_id());
            ctx = stage.run(ctx).await;
        }

        ctx
    }
}
