use std::cmp::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gridflow_common::{
    AbsoluteCellRange, Ast, CellError, CellValue, Dependency, ErrorType, SheetId,
    SimpleCellAddress,
};
use rustc_hash::FxHashSet;

use super::column_index::ColumnIndex;
use super::evaluator::{EvalOutcome, Evaluator, current_formula};
use super::graph::{DependencyGraph, GraphEdit};
use super::lazy::LazyTransformService;
use super::scheduler::Scheduler;
use super::sheet_registry::SheetRegistry;
use super::transform::{CleanOutOfScopeTransformer, Transformer};
use super::vertex::{VertexId, VertexKind};
use super::EvalConfig;
use crate::error::{EngineError, Result};
use crate::traits::{Interpreter, ParsedFormula, Parser};

/// Log entries kept before compaction is attempted.
const COMPACTION_THRESHOLD: usize = 64;

pub struct Engine<I> {
    pub(crate) graph: DependencyGraph,
    pub(crate) lazy: LazyTransformService,
    pub(crate) column_index: ColumnIndex,
    pub(crate) sheets: SheetRegistry,
    interpreter: I,
    config: EvalConfig,
    /// Vertices whose value is stale.
    pub(crate) dirty: FxHashSet<VertexId>,
    /// Formulas whose edges must be rebuilt from their transformed tree.
    pub(crate) suspects: FxHashSet<VertexId>,
    batch_depth: u32,
    last_result: Option<EvalResult>,
}

#[derive(Debug, Clone, Default)]
pub struct EvalResult {
    pub computed_vertices: usize,
    pub cycle_errors: usize,
    pub elapsed: Duration,
}

impl<I> Engine<I>
where
    I: Interpreter,
{
    pub fn new(interpreter: I, config: EvalConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            graph: DependencyGraph::new(),
            lazy: LazyTransformService::new(),
            column_index: ColumnIndex::new(),
            sheets: SheetRegistry::new(),
            interpreter,
            config,
            dirty: FxHashSet::default(),
            suspects: FxHashSet::default(),
            batch_depth: 0,
            last_result: None,
        })
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Replace the configuration. Every formula is recomputed when it changed.
    pub fn set_config(&mut self, config: EvalConfig) -> Result<()> {
        config.validate()?;
        if config == self.config {
            return Ok(());
        }
        self.config = config;
        self.dirty.extend(self.graph.formula_vertices());
        self.finish_operation();
        Ok(())
    }

    pub fn interpreter(&self) -> &I {
        &self.interpreter
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Number of structural transformations committed so far.
    pub fn version(&self) -> u64 {
        self.lazy.version()
    }

    /// Outcome of the most recent recalculation.
    pub fn last_result(&self) -> Option<&EvalResult> {
        self.last_result.as_ref()
    }

    /* ───────────────────────────── Sheets ───────────────────────────── */

    pub fn add_sheet(&mut self, name: &str) -> Result<SheetId> {
        if self.sheets.get_id(name).is_some() {
            return Err(EngineError::SheetNameTaken(name.to_string()));
        }
        Ok(self.sheets.id_for(name))
    }

    pub fn sheet_id(&self, name: &str) -> Option<SheetId> {
        self.sheets.get_id(name)
    }

    pub fn sheet_name(&self, id: SheetId) -> Option<&str> {
        self.sheets.name(id)
    }

    pub fn sheets(&self) -> &SheetRegistry {
        &self.sheets
    }

    /* ───────────────────────────── Cells ───────────────────────────── */

    pub fn get_cell_value(&self, address: SimpleCellAddress) -> CellValue {
        self.graph.value_at(&address)
    }

    pub(crate) fn check_address(&self, address: SimpleCellAddress) -> Result<()> {
        if self.sheets.contains(address.sheet) && address.is_within_grid() {
            Ok(())
        } else {
            Err(EngineError::InvalidAddress(address))
        }
    }

    /// The array formula covering `address`, with its area.
    pub(crate) fn matrix_at(&self, address: &SimpleCellAddress) -> Option<(VertexId, AbsoluteCellRange)> {
        let id = self.graph.get_cell(address)?;
        match &self.graph.vertex(id)?.kind {
            VertexKind::Matrix(m) => Some((id, m.range())),
            _ => None,
        }
    }

    /// A cell can take new content when it exists on a live sheet and is not
    /// covered by an array formula other than at its anchor.
    pub fn is_it_possible_to_set_cell(&self, address: SimpleCellAddress) -> bool {
        self.check_cell_writable(address).is_ok()
    }

    fn check_cell_writable(&self, address: SimpleCellAddress) -> Result<()> {
        self.check_address(address)?;
        match self.matrix_at(&address) {
            Some((_, area)) if area.start != address => {
                Err(EngineError::MatrixIntersection(address))
            }
            _ => Ok(()),
        }
    }

    /// Empty `address` ahead of new content: drop a matrix anchored there and
    /// take the old value out of the column index.
    fn release_cell(&mut self, address: SimpleCellAddress) {
        if let Some((id, _)) = self.matrix_at(&address) {
            self.drop_matrix(id);
            return;
        }
        let Some(id) = self.graph.get_cell(&address) else {
            return;
        };
        if let Some(old) = self.graph.vertex(id).and_then(|v| v.value()).cloned() {
            self.column_index.remove(&self.lazy, &old, address);
        }
    }

    fn drop_matrix(&mut self, id: VertexId) {
        let (anchor, value) = match self.graph.vertex(id) {
            Some(v) => (v.cell(), v.value().cloned()),
            None => return,
        };
        if let (Some(anchor), Some(value)) = (anchor, value) {
            self.column_index.remove(&self.lazy, &value, anchor);
        }
        for reader in self.graph.remove_matrix(id) {
            if self.graph.vertex(reader).is_some_and(|v| v.is_formula()) {
                self.suspects.insert(reader);
            }
            self.dirty.insert(reader);
        }
    }

    pub fn set_value(&mut self, address: SimpleCellAddress, value: impl Into<CellValue>) -> Result<()> {
        self.check_cell_writable(address)?;
        let value = value.into();
        self.release_cell(address);
        self.column_index.add(&self.lazy, &value, address);
        let id = self.graph.set_value(address, value);
        self.dirty.insert(id);
        self.finish_operation();
        Ok(())
    }

    /// Store a parsed formula. References that already point outside the
    /// grid become `#REF!`.
    pub fn set_formula(&mut self, address: SimpleCellAddress, formula: ParsedFormula) -> Result<()> {
        self.check_cell_writable(address)?;
        let ParsedFormula { ast, dependencies } = formula;
        let ast = CleanOutOfScopeTransformer
            .transform_ast(&ast, address)
            .unwrap_or(ast);
        self.release_cell(address);
        let id = self
            .graph
            .set_formula(address, Arc::new(ast), self.lazy.version(), &dependencies);
        self.suspects.remove(&id);
        self.dirty.insert(id);
        self.finish_operation();
        Ok(())
    }

    /// Store an array formula whose result is laid out over
    /// `width x height` cells from `address`.
    pub fn set_matrix_formula(
        &mut self,
        address: SimpleCellAddress,
        formula: ParsedFormula,
        width: u32,
        height: u32,
    ) -> Result<()> {
        self.check_address(address)?;
        let area = AbsoluteCellRange::spanning(address, width, height)
            .map_err(|e| EngineError::InvalidRange(e.to_string()))?;
        let replaced = self.matrices_replaced_by(&area)?;

        for id in replaced {
            self.drop_matrix(id);
        }
        for (cell, id) in self.graph.cells_in(&area) {
            if let Some(old) = self.graph.vertex(id).and_then(|v| v.value()).cloned() {
                self.column_index.remove(&self.lazy, &old, cell);
            }
        }
        let ParsedFormula { ast, dependencies } = formula;
        let ast = CleanOutOfScopeTransformer
            .transform_ast(&ast, address)
            .unwrap_or(ast);
        let (id, readers) = self.graph.set_matrix(
            address,
            Arc::new(ast),
            self.lazy.version(),
            (width, height),
            &dependencies,
        );
        self.dirty.insert(id);
        self.dirty.extend(readers);
        self.finish_operation();
        Ok(())
    }

    /// Matrices entirely inside `area`; a partial overlap is an error.
    fn matrices_replaced_by(&self, area: &AbsoluteCellRange) -> Result<Vec<VertexId>> {
        let mut replaced = Vec::new();
        for (id, existing) in self.graph.matrices_on(area.sheet()) {
            if !existing.intersects(area) {
                continue;
            }
            if !area.contains_range(&existing) {
                return Err(EngineError::MatrixIntersection(existing.start));
            }
            replaced.push(id);
        }
        Ok(replaced)
    }

    pub fn clear_cell(&mut self, address: SimpleCellAddress) -> Result<()> {
        self.check_cell_writable(address)?;
        if let Some((id, _)) = self.matrix_at(&address) {
            self.drop_matrix(id);
        } else {
            self.release_cell(address);
            let readers = self.graph.clear_cell(&address);
            self.dirty.extend(readers);
        }
        self.finish_operation();
        Ok(())
    }

    /// Classify raw input: `=` starts a formula, then numbers, booleans and
    /// text. Formulas that fail to parse are stored as `#ERROR!`; an empty
    /// string clears the cell.
    pub fn set_cell_contents<P>(&mut self, parser: &P, address: SimpleCellAddress, text: &str) -> Result<()>
    where
        P: Parser + ?Sized,
    {
        if text.is_empty() {
            return self.clear_cell(address);
        }
        if let Some(formula) = text.strip_prefix('=') {
            return match parser.parse(formula, address, &self.sheets) {
                Ok(parsed) => self.set_formula(address, parsed),
                Err(err) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(%address, %err, "formula failed to parse");
                    let error = CellError::new(ErrorType::Error).with_message(err.message);
                    self.set_value(address, error)
                }
            };
        }
        let trimmed = text.trim();
        let value = if let Some(n) = parse_number(trimmed) {
            CellValue::Number(n)
        } else if trimmed.eq_ignore_ascii_case("TRUE") {
            CellValue::Boolean(true)
        } else if trimmed.eq_ignore_ascii_case("FALSE") {
            CellValue::Boolean(false)
        } else {
            CellValue::Text(text.to_string())
        };
        self.set_value(address, value)
    }

    /* ─────────────────────────── Introspection ─────────────────────────── */

    /// The formula at `address` with every pending structural edit applied.
    pub fn formula_at(&mut self, address: SimpleCellAddress) -> Option<Arc<Ast>> {
        let id = self.graph.get_cell(&address)?;
        if self.graph.vertex(id)?.cell() != Some(address) {
            return None;
        }
        current_formula(&mut self.graph, &self.lazy, id).map(|(ast, _)| ast)
    }

    /// What the vertex at `address` reads, cells before ranges.
    pub fn dependencies_of(&self, address: SimpleCellAddress) -> Vec<Dependency> {
        let Some(id) = self.graph.get_cell(&address) else {
            return Vec::new();
        };
        let mut deps: Vec<Dependency> = self
            .graph
            .dependencies(id)
            .into_iter()
            .filter_map(|dep| {
                let vertex = self.graph.vertex(dep)?;
                match &vertex.kind {
                    VertexKind::Range(r) => Some(Dependency::Range(r.range)),
                    _ => vertex.cell().map(Dependency::Cell),
                }
            })
            .collect();
        deps.sort_by_key(|d| match d {
            Dependency::Cell(a) => (0, *a, *a),
            Dependency::Range(r) => (1, r.start, r.end),
        });
        deps
    }

    /* ───────────────────────────── Lookups ───────────────────────────── */

    /// Row of the first cell in the single-column `range` equal to `key`.
    ///
    /// Uses the column index when enabled, otherwise a binary search over
    /// computed values when `sorted` and a linear scan when not.
    pub fn find_in_column(
        &mut self,
        key: &CellValue,
        range: &AbsoluteCellRange,
        sorted: bool,
    ) -> Result<Option<u32>> {
        if !self.sheets.contains(range.sheet()) {
            return Err(EngineError::NoSuchSheet(range.sheet()));
        }
        if range.width() != 1 {
            return Err(EngineError::InvalidRange(
                "lookup range must be a single column".into(),
            ));
        }
        if self.config.use_column_index {
            return Ok(self.column_index.find_in_range(&self.lazy, key, range));
        }
        let Some(extent) = self.graph.used_extent(range) else {
            return Ok(None);
        };
        let column: Vec<CellValue> = (extent.start.row..=extent.end.row)
            .map(|row| self.graph.value_at(&SimpleCellAddress::new(range.sheet(), range.start.col, row)))
            .collect();
        let found = if sorted {
            let i = column.partition_point(|v| compare_values(v, key) == Ordering::Less);
            column.get(i).filter(|v| *v == key).map(|_| i)
        } else {
            column.iter().position(|v| v == key)
        };
        Ok(found.map(|i| extent.start.row + i as u32))
    }

    /* ─────────────────────────── Evaluation ─────────────────────────── */

    /// Run `f` with recalculation and edge repair deferred to its end.
    /// Nested batches are absorbed into the outermost one.
    pub fn batch<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.begin_batch();
        let out = f(self);
        self.end_batch();
        out
    }

    pub fn begin_batch(&mut self) {
        self.batch_depth += 1;
        #[cfg(feature = "tracing")]
        tracing::debug!(depth = self.batch_depth, "begin batch");
    }

    pub fn end_batch(&mut self) {
        self.batch_depth = self.batch_depth.saturating_sub(1);
        #[cfg(feature = "tracing")]
        tracing::debug!(depth = self.batch_depth, "end batch");
        self.finish_operation();
    }

    pub fn in_batch(&self) -> bool {
        self.batch_depth > 0
    }

    pub(crate) fn finish_operation(&mut self) {
        if self.batch_depth == 0 {
            self.recalculate();
        }
    }

    pub(crate) fn absorb(&mut self, edit: GraphEdit) {
        self.dirty.extend(edit.changed);
        self.suspects.extend(edit.suspects);
    }

    /// Rebuild the edges of every suspect formula from its current tree.
    fn repair_suspects(&mut self) {
        let mut suspects: Vec<VertexId> = self.suspects.drain().collect();
        suspects.sort_unstable();
        for id in suspects {
            let Some((ast, address)) = current_formula(&mut self.graph, &self.lazy, id) else {
                continue;
            };
            let dependencies = ast.dependencies(address);
            self.graph.set_dependencies(id, &dependencies);
            self.dirty.insert(id);
        }
    }

    /// Evaluate everything that changed since the last recalculation.
    pub fn recalculate(&mut self) -> EvalResult {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("recalculate", dirty = self.dirty.len()).entered();

        let start = Instant::now();
        self.repair_suspects();
        let roots: Vec<VertexId> = self
            .dirty
            .drain()
            .filter(|id| self.graph.contains(*id))
            .collect();
        let outcome = if roots.is_empty() {
            EvalOutcome::default()
        } else {
            let mut affected: Vec<VertexId> = self.graph.forward_closure(roots).into_iter().collect();
            affected.sort_unstable();
            self.evaluate(&affected)
        };
        self.compact_log();
        let result = EvalResult {
            computed_vertices: outcome.computed_vertices,
            cycle_errors: outcome.cycle_errors,
            elapsed: start.elapsed(),
        };
        self.last_result = Some(result.clone());
        result
    }

    /// Evaluate every formula, whether or not anything changed.
    pub fn recompute_all(&mut self) -> EvalResult {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("recompute_all").entered();
        self.dirty.extend(self.graph.formula_vertices());
        self.recalculate()
    }

    fn evaluate(&mut self, vertices: &[VertexId]) -> EvalOutcome {
        let schedule = Scheduler::new(&self.graph).create_schedule(vertices);
        Evaluator::new(
            &mut self.graph,
            &self.lazy,
            &mut self.column_index,
            &self.config,
            &self.interpreter,
        )
        .run(&schedule)
    }

    /// Drop log entries that every formula, matrix and index entry has
    /// already absorbed.
    fn compact_log(&mut self) {
        if self.lazy.log_len() <= COMPACTION_THRESHOLD {
            return;
        }
        let formula_versions = self
            .graph
            .formula_vertices()
            .into_iter()
            .filter_map(|id| match &self.graph.vertex(id)?.kind {
                VertexKind::Formula(f) => Some(f.version),
                VertexKind::Matrix(m) => Some(m.version),
                _ => None,
            });
        let oldest = formula_versions
            .chain(self.column_index.oldest_version())
            .min()
            .unwrap_or(self.lazy.version());
        self.lazy.compact(oldest);
    }
}

/// Finite decimal literals only; `inf`, `nan` and overflowing exponents stay text.
fn parse_number(text: &str) -> Option<f64> {
    let decimal = text.bytes().any(|b| b.is_ascii_digit())
        && text
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'));
    if !decimal {
        return None;
    }
    text.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Lookup order for sorted columns: numbers, then text (case-insensitive),
/// then booleans. Blanks and errors sort last.
pub(crate) fn compare_values(a: &CellValue, b: &CellValue) -> Ordering {
    fn rank(v: &CellValue) -> u8 {
        match v {
            CellValue::Number(_) => 0,
            CellValue::Text(_) => 1,
            CellValue::Boolean(_) => 2,
            _ => 3,
        }
    }
    match (a, b) {
        (CellValue::Number(x), CellValue::Number(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (CellValue::Text(x), CellValue::Text(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
        (CellValue::Boolean(x), CellValue::Boolean(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
