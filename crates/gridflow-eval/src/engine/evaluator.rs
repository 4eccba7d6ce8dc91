use std::sync::Arc;

use gridflow_common::{AbsoluteCellRange, Ast, CellError, CellValue, SimpleCellAddress};

use super::EvalConfig;
use super::column_index::ColumnIndex;
use super::graph::DependencyGraph;
use super::lazy::LazyTransformService;
use super::scheduler::Schedule;
use super::vertex::{VertexId, VertexKind};
use crate::traits::{EvaluationContext, Interpreter};

/// [`EvaluationContext`] backed by the values stored in the graph.
pub struct GraphContext<'g> {
    graph: &'g mut DependencyGraph,
}

impl<'g> GraphContext<'g> {
    pub fn new(graph: &'g mut DependencyGraph) -> Self {
        Self { graph }
    }
}

impl EvaluationContext for GraphContext<'_> {
    fn cell_value(&self, address: SimpleCellAddress) -> CellValue {
        self.graph.value_at(&address)
    }

    fn range_values(&self, range: &AbsoluteCellRange) -> Vec<Vec<CellValue>> {
        self.graph.range_values(range)
    }

    fn cached_range_value(&self, range: &AbsoluteCellRange, function: &str) -> Option<CellValue> {
        let id = self.graph.get_range(range)?;
        match &self.graph.vertex(id)?.kind {
            VertexKind::Range(r) => r.cached(function).cloned(),
            _ => None,
        }
    }

    fn store_range_value(&mut self, range: &AbsoluteCellRange, function: &str, value: CellValue) {
        let Some(id) = self.graph.get_range(range) else {
            return;
        };
        if let Some(VertexKind::Range(r)) = self.graph.vertex_mut(id).map(|v| &mut v.kind) {
            r.store(function, value);
        }
    }
}

/// Bring the tree of a formula or matrix vertex up to date and memoize it.
pub(crate) fn current_formula(
    graph: &mut DependencyGraph,
    lazy: &LazyTransformService,
    id: VertexId,
) -> Option<(Arc<Ast>, SimpleCellAddress)> {
    let vertex = graph.vertex_mut(id)?;
    let (ast, address, version) = match &mut vertex.kind {
        VertexKind::Formula(f) => (&mut f.ast, &mut f.address, &mut f.version),
        VertexKind::Matrix(m) => (&mut m.ast, &mut m.address, &mut m.version),
        _ => return None,
    };
    if !lazy.is_current(*version) {
        let resolved = lazy.resolve(ast, *address, *version);
        *ast = resolved.ast;
        *address = resolved.address;
        *version = resolved.version;
    }
    Some((Arc::clone(ast), *address))
}

/// Lay a result out over a `width x height` array formula: scalars broadcast,
/// positions the result does not reach read `#N/A`.
fn spread(value: &CellValue, width: u32, height: u32) -> CellValue {
    CellValue::Array(
        (0..height as usize)
            .map(|row| {
                (0..width as usize)
                    .map(|col| value.array_element(row, col))
                    .collect()
            })
            .collect(),
    )
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EvalOutcome {
    /// Interpreter calls made.
    pub computed_vertices: usize,
    /// Formulas set to `#CYCLE!`.
    pub cycle_errors: usize,
}

pub struct Evaluator<'e, I: Interpreter + ?Sized> {
    graph: &'e mut DependencyGraph,
    lazy: &'e LazyTransformService,
    column_index: &'e mut ColumnIndex,
    config: &'e EvalConfig,
    interpreter: &'e I,
}

impl<'e, I: Interpreter + ?Sized> Evaluator<'e, I> {
    pub fn new(
        graph: &'e mut DependencyGraph,
        lazy: &'e LazyTransformService,
        column_index: &'e mut ColumnIndex,
        config: &'e EvalConfig,
        interpreter: &'e I,
    ) -> Self {
        Self {
            graph,
            lazy,
            column_index,
            config,
            interpreter,
        }
    }

    /// Evaluate a schedule layer by layer. Cycles are solved iteratively
    /// when enabled and set to `#CYCLE!` otherwise.
    pub fn run(&mut self, schedule: &Schedule) -> EvalOutcome {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!(
            "evaluate_schedule",
            layers = schedule.layers.len(),
            cycles = schedule.cycles.len()
        )
        .entered();

        let mut outcome = EvalOutcome::default();
        for layer in &schedule.layers {
            for &id in &layer.vertices {
                if self.evaluate_vertex(id) {
                    outcome.computed_vertices += 1;
                }
            }
            for cycle in &layer.cycles {
                if self.config.iterative_calculation_enable {
                    outcome.computed_vertices += self.solve_cycle(cycle);
                } else {
                    outcome.cycle_errors += self.mark_cycle(cycle);
                }
            }
        }
        outcome
    }

    /// Returns whether the interpreter ran.
    pub fn evaluate_vertex(&mut self, id: VertexId) -> bool {
        let is_range = match self.graph.vertex(id) {
            Some(v) => v.is_range(),
            None => return false,
        };
        if is_range {
            if let Some(VertexKind::Range(r)) = self.graph.vertex_mut(id).map(|v| &mut v.kind) {
                r.clear_cache();
            }
            return false;
        }
        let Some((ast, address)) = current_formula(self.graph, self.lazy, id) else {
            return false;
        };
        let value = {
            let mut ctx = GraphContext::new(self.graph);
            self.interpreter.evaluate(&ast, address, &mut ctx)
        };
        self.store(id, value);
        true
    }

    fn store(&mut self, id: VertexId, value: CellValue) {
        let Some(vertex) = self.graph.vertex_mut(id) else {
            return;
        };
        let (slot, value) = match &mut vertex.kind {
            VertexKind::Formula(f) => (&mut f.value, value),
            VertexKind::Matrix(m) => {
                let spread = spread(&value, m.width, m.height);
                (&mut m.value, spread)
            }
            _ => return,
        };
        let old = std::mem::replace(slot, value);
        let Some(address) = vertex.cell else {
            return;
        };
        if let Some(new) = vertex.value() {
            self.column_index.change(self.lazy, &old, new, address);
        }
    }

    fn value_of(&self, id: VertexId) -> CellValue {
        self.graph
            .vertex(id)
            .and_then(|v| v.value().cloned())
            .unwrap_or(CellValue::Empty)
    }

    fn mark_cycle(&mut self, cycle: &[VertexId]) -> usize {
        let mut marked = 0;
        for &id in cycle {
            match self.graph.vertex(id).map(|v| v.is_range()) {
                Some(true) => {
                    self.evaluate_vertex(id);
                }
                Some(false) => {
                    self.store(id, CellError::cycle().into());
                    marked += 1;
                }
                None => {}
            }
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(members = cycle.len(), marked, "cycle without iterative calculation");
        marked
    }

    /// Gauss-Seidel fixed point over the formulas of one strongly connected
    /// component. Members are visited by sheet, then column, then row.
    fn solve_cycle(&mut self, cycle: &[VertexId]) -> usize {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("solve_cycle", members = cycle.len()).entered();

        let (ranges, mut formulas): (Vec<VertexId>, Vec<VertexId>) = cycle
            .iter()
            .copied()
            .partition(|id| self.graph.vertex(*id).is_some_and(|v| v.is_range()));
        formulas.sort_by_key(|id| {
            let cell = self.graph.vertex(*id).and_then(|v| v.cell());
            cell.map(|c| (c.sheet, c.col, c.row))
        });

        for &id in &formulas {
            self.store(id, self.config.initial_value.clone());
        }

        let mut computed = 0;
        for iteration in 0..self.config.max_iterations {
            let mut max_change: f64 = 0.0;
            for &id in &formulas {
                for &r in &ranges {
                    self.evaluate_vertex(r);
                }
                let before = self.value_of(id);
                if self.evaluate_vertex(id) {
                    computed += 1;
                }
                max_change = max_change.max(before.distance(&self.value_of(id)));
            }
            if max_change < self.config.convergence_threshold {
                #[cfg(feature = "tracing")]
                tracing::debug!(iterations = iteration + 1, "cycle converged");
                break;
            }
        }
        computed
    }
}
