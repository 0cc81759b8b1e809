//! Concrete pipeline stage implementations.

pub mod analyzer;
pub mod optimizer;
pub mod reporter;
pub mod scanner;

pub use analyzer::AnalyzerStage;
pub use optimizer::OptimizerStage;
pub use reporter::ReporterStage;
pub use scanner::{ScannerSettings, ScannerStage};

use crate::config::Config;
use crate::models::StageKind;
use crate::pipeline::Stage;

/// Builds the ordered stage list up to and including `target`.
///
/// Standalone commands replay their prerequisite stages each time; a
/// caller that wants to reuse earlier results must persist the session
/// and reload it instead.
pub fn stages_through(target: StageKind, config: &Config) -> Vec<Box<dyn Stage>> {
    let mut stages: Vec<Box<dyn Stage>> =
        vec![Box::new(ScannerStage::new(ScannerSettings::from(&config.scan)))];

    if target == StageKind::Scan {
        return stages;
    }
    stages.push(Box::new(AnalyzerStage::new()));

    if target == StageKind::Analyze {
        return stages;
    }
    stages.push(Box::new(OptimizerStage::new()));

    if target == StageKind::Optimize {
        return stages;
    }
    stages.push(Box::new(ReporterStage::new()));

    stages
}
