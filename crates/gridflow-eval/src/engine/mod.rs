//! Gridflow dependency-graph engine
//!
//! Incremental evaluation with dependency tracking, lazily applied structural
//! rewrites and a per-column search index.

pub mod column_index;
pub mod eval;
pub mod evaluator;
pub mod graph;
pub mod lazy;
pub mod scheduler;
pub mod sheet_registry;
mod structure;
pub mod transform;
pub mod vertex;

#[cfg(test)]
mod tests;

pub use column_index::ColumnIndex;
pub use eval::{Engine, EvalResult};
pub use evaluator::{EvalOutcome, Evaluator, GraphContext};
pub use graph::{Axis, DependencyGraph, GraphEdit};
pub use lazy::{LazyTransformService, Resolved, Transformation};
pub use scheduler::{Layer, Schedule, Scheduler};
pub use sheet_registry::SheetRegistry;
pub use vertex::{Vertex, VertexId, VertexKind};

use gridflow_common::CellValue;

use crate::error::{EngineError, Result};

/// Configuration for the evaluation engine
#[derive(Debug, Clone, PartialEq)]
pub struct EvalConfig {
    /// Solve circular references by fixed-point iteration instead of
    /// reporting `#CYCLE!`.
    pub iterative_calculation_enable: bool,
    pub max_iterations: u32,
    /// Iteration stops once the largest change of a pass is strictly below this.
    pub convergence_threshold: f64,
    /// Starting value of every cycle member.
    pub initial_value: CellValue,
    /// Answer column lookups from the column index.
    pub use_column_index: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            iterative_calculation_enable: false,
            max_iterations: 100,
            convergence_threshold: 0.001,
            initial_value: CellValue::Number(0.0),
            use_column_index: true,
        }
    }
}

impl EvalConfig {
    pub fn with_iterative_calculation(mut self, enable: bool) -> Self {
        self.iterative_calculation_enable = enable;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_convergence_threshold(mut self, threshold: f64) -> Self {
        self.convergence_threshold = threshold;
        self
    }

    pub fn with_initial_value(mut self, value: impl Into<CellValue>) -> Self {
        self.initial_value = value.into();
        self
    }

    pub fn with_column_index(mut self, enable: bool) -> Self {
        self.use_column_index = enable;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(EngineError::InvalidConfig(
                "max_iterations must be positive".into(),
            ));
        }
        if self.convergence_threshold.is_nan() || self.convergence_threshold < 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "convergence_threshold must be a non-negative number, got {}",
                self.convergence_threshold
            )));
        }
        Ok(())
    }
}
