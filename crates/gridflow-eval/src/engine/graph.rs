use std::sync::Arc;

use gridflow_common::{
    AbsoluteCellRange, Ast, CellValue, Dependency, MAX_COL, MAX_ROW, SheetId, SimpleCellAddress,
    Span,
};
use rustc_hash::{FxHashMap, FxHashSet};

use super::vertex::{FormulaVertex, MatrixVertex, RangeVertex, Vertex, VertexId, VertexKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Rows,
    Columns,
}

impl Axis {
    fn of(self, address: &SimpleCellAddress) -> u32 {
        match self {
            Axis::Rows => address.row,
            Axis::Columns => address.col,
        }
    }

    fn with(self, address: SimpleCellAddress, index: u32) -> SimpleCellAddress {
        match self {
            Axis::Rows => SimpleCellAddress::new(address.sheet, address.col, index),
            Axis::Columns => SimpleCellAddress::new(address.sheet, index, address.row),
        }
    }

    pub fn limit(self) -> u32 {
        match self {
            Axis::Rows => MAX_ROW,
            Axis::Columns => MAX_COL,
        }
    }

    /// Ranges spanning the whole of this axis are unaffected by edits along it.
    fn spans_whole_axis(self, range: &AbsoluteCellRange) -> bool {
        match self {
            Axis::Rows => range.is_whole_columns(),
            Axis::Columns => range.is_whole_rows(),
        }
    }
}

/// Insert or remove `span` along an axis, for one index.
/// `None` means the index itself was removed.
pub(crate) fn shift_index(index: i64, span: &Span, insert: bool) -> Option<i64> {
    let start = span.start as i64;
    let count = span.count as i64;
    if insert {
        Some(if index >= start { index + count } else { index })
    } else if index < start {
        Some(index)
    } else if index < start + count {
        None
    } else {
        Some(index - count)
    }
}

/// Same as [`shift_index`] for an interval: removal truncates, and only an
/// interval entirely inside the removed span disappears.
pub(crate) fn shift_interval(lo: i64, hi: i64, span: &Span, insert: bool) -> Option<(i64, i64)> {
    if insert {
        return Some((shift_index(lo, span, true)?, shift_index(hi, span, true)?));
    }
    let start = span.start as i64;
    let end = start + span.count as i64 - 1;
    if lo >= start && hi <= end {
        return None;
    }
    let new_lo = if lo < start {
        lo
    } else if lo <= end {
        start
    } else {
        lo - span.count as i64
    };
    let new_hi = if hi < start {
        hi
    } else if hi <= end {
        start - 1
    } else {
        hi - span.count as i64
    };
    Some((new_lo, new_hi))
}

/// Follow-up work a structural edit leaves for the engine.
#[derive(Debug, Default)]
pub struct GraphEdit {
    /// Vertices whose value must be recomputed.
    pub changed: Vec<VertexId>,
    /// Formulas whose edges must be rebuilt from their transformed AST.
    pub suspects: Vec<VertexId>,
    /// Values that left the grid, with the address they had.
    pub removed_values: Vec<(SimpleCellAddress, CellValue)>,
}

impl GraphEdit {
    fn absorb_dependents(&mut self, vertex: &Vertex) {
        self.changed.extend(vertex.dependents.iter().copied());
    }
}

/// Directed graph over cells and ranges.
///
/// Vertices live in a flat arena addressed by [`VertexId`]; adjacency is kept
/// as id sets on both ends of every edge. An edge `a -> b` means `b` reads `a`.
pub struct DependencyGraph {
    vertices: Vec<Option<Vertex>>,
    cells: FxHashMap<SimpleCellAddress, VertexId>,
    ranges: FxHashMap<AbsoluteCellRange, VertexId>,
    empty: VertexId,
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self {
            vertices: vec![Some(Vertex::new(VertexKind::Empty, None))],
            cells: FxHashMap::default(),
            ranges: FxHashMap::default(),
            empty: VertexId::new(0),
        }
    }

    /* ───────────────────────── lookups ───────────────────────── */

    /// The one vertex standing in for every unreferenced blank cell. It is
    /// never mapped to an address and never has edges.
    pub fn empty_cell(&self) -> VertexId {
        self.empty
    }

    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertices.get(id.as_index()).and_then(Option::as_ref)
    }

    pub(crate) fn vertex_mut(&mut self, id: VertexId) -> Option<&mut Vertex> {
        self.vertices.get_mut(id.as_index()).and_then(Option::as_mut)
    }

    pub fn contains(&self, id: VertexId) -> bool {
        self.vertex(id).is_some()
    }

    /// Live vertices, not counting the shared empty cell.
    pub fn vertex_count(&self) -> usize {
        self.vertices.iter().flatten().count() - 1
    }

    pub fn get_cell(&self, address: &SimpleCellAddress) -> Option<VertexId> {
        self.cells.get(address).copied()
    }

    /// Like [`get_cell`](Self::get_cell) but falls back to the shared empty cell.
    pub fn lookup(&self, address: &SimpleCellAddress) -> VertexId {
        self.get_cell(address).unwrap_or(self.empty)
    }

    pub fn get_range(&self, range: &AbsoluteCellRange) -> Option<VertexId> {
        self.ranges.get(range).copied()
    }

    pub fn range_count(&self) -> usize {
        self.ranges.len()
    }

    pub fn value_at(&self, address: &SimpleCellAddress) -> CellValue {
        let Some(vertex) = self.vertex(self.lookup(address)) else {
            return CellValue::Empty;
        };
        match &vertex.kind {
            VertexKind::Matrix(m) => m.value_at(*address),
            _ => vertex.value().cloned().unwrap_or(CellValue::Empty),
        }
    }

    /// Row-major values; whole-column/row ranges are clipped to the cells
    /// actually present.
    pub fn range_values(&self, range: &AbsoluteCellRange) -> Vec<Vec<CellValue>> {
        let Some(extent) = self.used_extent(range) else {
            return Vec::new();
        };
        (extent.start.row..=extent.end.row)
            .map(|row| {
                (extent.start.col..=extent.end.col)
                    .map(|col| self.value_at(&SimpleCellAddress::new(range.sheet(), col, row)))
                    .collect()
            })
            .collect()
    }

    /// The part of `range` worth iterating: itself when finite, otherwise
    /// clipped along its open axis to the last cell in use.
    pub fn used_extent(&self, range: &AbsoluteCellRange) -> Option<AbsoluteCellRange> {
        if range.is_finite() {
            return Some(*range);
        }
        let mut bounds: Option<(u32, u32)> = None;
        for address in self.cells.keys().filter(|a| range.contains(a)) {
            let (col, row) = (address.col, address.row);
            bounds = Some(match bounds {
                None => (col, row),
                Some((c, r)) => (c.max(col), r.max(row)),
            });
        }
        let (max_col, max_row) = bounds?;
        let end_col = if range.is_whole_rows() { max_col } else { range.end.col };
        let end_row = if range.is_whole_columns() { max_row } else { range.end.row };
        let end = SimpleCellAddress::new(range.sheet(), end_col, end_row);
        Some(AbsoluteCellRange {
            start: range.start,
            end,
        })
    }

    /// Mapped cells inside `range`, sorted by address. Matrix vertices appear
    /// once per covered address.
    pub fn cells_in(&self, range: &AbsoluteCellRange) -> Vec<(SimpleCellAddress, VertexId)> {
        let mut found: Vec<(SimpleCellAddress, VertexId)> =
            if range.is_finite() && range.size() <= self.cells.len() as u64 {
                range
                    .addresses()
                    .filter_map(|a| self.get_cell(&a).map(|id| (a, id)))
                    .collect()
            } else {
                self.cells
                    .iter()
                    .filter(|(a, _)| range.contains(a))
                    .map(|(a, id)| (*a, *id))
                    .collect()
            };
        found.sort_unstable();
        found
    }

    pub fn cells_on_sheet(&self, sheet: SheetId) -> Vec<(SimpleCellAddress, VertexId)> {
        let mut found: Vec<_> = self
            .cells
            .iter()
            .filter(|(a, _)| a.sheet == sheet)
            .map(|(a, id)| (*a, *id))
            .collect();
        found.sort_unstable();
        found
    }

    pub fn ranges_on_sheet(&self, sheet: SheetId) -> Vec<(AbsoluteCellRange, VertexId)> {
        let mut found: Vec<_> = self
            .ranges
            .iter()
            .filter(|(r, _)| r.sheet() == sheet)
            .map(|(r, id)| (*r, *id))
            .collect();
        found.sort_unstable();
        found
    }

    pub fn has_content_on(&self, sheet: SheetId) -> bool {
        self.cells.keys().any(|a| a.sheet == sheet) || self.ranges.keys().any(|r| r.sheet() == sheet)
    }

    pub fn formula_vertices(&self) -> Vec<VertexId> {
        self.ids_where(Vertex::is_formula)
    }

    pub fn matrix_vertices(&self) -> Vec<VertexId> {
        self.ids_where(|v| matches!(v.kind, VertexKind::Matrix(_)))
    }

    fn ids_where(&self, pred: impl Fn(&Vertex) -> bool) -> Vec<VertexId> {
        self.vertices
            .iter()
            .enumerate()
            .filter_map(|(i, v)| match v {
                Some(v) if pred(v) => Some(VertexId::new(i as u32)),
                _ => None,
            })
            .collect()
    }

    pub fn matrices_on(&self, sheet: SheetId) -> Vec<(VertexId, AbsoluteCellRange)> {
        self.matrix_vertices()
            .into_iter()
            .filter_map(|id| match &self.vertex(id)?.kind {
                VertexKind::Matrix(m) if m.address.sheet == sheet => Some((id, m.range())),
                _ => None,
            })
            .collect()
    }

    /* ───────────────────────── edges ───────────────────────── */

    pub fn add_vertex(&mut self, kind: VertexKind, cell: Option<SimpleCellAddress>) -> VertexId {
        let id = VertexId::new(self.vertices.len() as u32);
        self.vertices.push(Some(Vertex::new(kind, cell)));
        id
    }

    /// Drop a vertex with all its edges and address/range mappings.
    pub fn remove_vertex(&mut self, id: VertexId) -> Option<Vertex> {
        if id == self.empty {
            return None;
        }
        let vertex = self.vertices.get_mut(id.as_index())?.take()?;
        for dep in &vertex.dependencies {
            if let Some(v) = self.vertex_mut(*dep) {
                v.dependents.remove(&id);
            }
        }
        for dependent in &vertex.dependents {
            if let Some(v) = self.vertex_mut(*dependent) {
                v.dependencies.remove(&id);
            }
        }
        match &vertex.kind {
            VertexKind::Range(r) => {
                if self.ranges.get(&r.range) == Some(&id) {
                    self.ranges.remove(&r.range);
                }
            }
            VertexKind::Matrix(m) => {
                for address in m.range().addresses() {
                    if self.cells.get(&address) == Some(&id) {
                        self.cells.remove(&address);
                    }
                }
            }
            _ => {
                if let Some(cell) = vertex.cell {
                    if self.cells.get(&cell) == Some(&id) {
                        self.cells.remove(&cell);
                    }
                }
            }
        }
        Some(vertex)
    }

    /// `to` starts reading `from`.
    pub fn add_edge(&mut self, from: VertexId, to: VertexId) {
        if !self.contains(from) || !self.contains(to) {
            return;
        }
        if let Some(v) = self.vertex_mut(from) {
            v.dependents.insert(to);
        }
        if let Some(v) = self.vertex_mut(to) {
            v.dependencies.insert(from);
        }
    }

    pub fn remove_edge(&mut self, from: VertexId, to: VertexId) {
        if let Some(v) = self.vertex_mut(from) {
            v.dependents.remove(&to);
        }
        if let Some(v) = self.vertex_mut(to) {
            v.dependencies.remove(&from);
        }
    }

    pub fn exists_edge(&self, from: VertexId, to: VertexId) -> bool {
        self.vertex(from)
            .is_some_and(|v| v.dependents.contains(&to))
    }

    pub fn dependents(&self, id: VertexId) -> Vec<VertexId> {
        self.vertex(id)
            .map(|v| v.dependents.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn dependencies(&self, id: VertexId) -> Vec<VertexId> {
        self.vertex(id)
            .map(|v| v.dependencies.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every vertex reachable from `roots` along dependent edges, roots included.
    pub fn forward_closure(&self, roots: impl IntoIterator<Item = VertexId>) -> FxHashSet<VertexId> {
        let mut seen = FxHashSet::default();
        let mut to_visit: Vec<VertexId> = roots.into_iter().collect();
        while let Some(id) = to_visit.pop() {
            let Some(vertex) = self.vertex(id) else {
                continue;
            };
            if !seen.insert(id) {
                continue;
            }
            to_visit.extend(vertex.dependents.iter().copied());
        }
        seen
    }

    /* ───────────────────────── cell content ───────────────────────── */

    /// Store a literal. Returns the vertex now holding it.
    pub fn set_value(&mut self, address: SimpleCellAddress, value: CellValue) -> VertexId {
        let id = self.claim_cell(address);
        let became_filled = self.vertex(id).is_some_and(Vertex::is_blank);
        if let Some(v) = self.vertex_mut(id) {
            v.kind = VertexKind::Value(value);
        }
        if became_filled {
            self.link_into_ranges(id, &[address]);
        }
        id
    }

    /// Store a formula and wire its dependencies.
    pub fn set_formula(
        &mut self,
        address: SimpleCellAddress,
        ast: Arc<Ast>,
        version: u64,
        dependencies: &[Dependency],
    ) -> VertexId {
        let id = self.claim_cell(address);
        let became_filled = self.vertex(id).is_some_and(Vertex::is_blank);
        if let Some(v) = self.vertex_mut(id) {
            v.kind = VertexKind::Formula(FormulaVertex {
                ast,
                address,
                version,
                value: CellValue::Empty,
            });
        }
        if became_filled {
            self.link_into_ranges(id, &[address]);
        }
        self.set_dependencies(id, dependencies);
        id
    }

    /// Store an array formula over `width x height` cells from `address`.
    /// Whatever occupied those cells is replaced; its readers now read the
    /// matrix and are returned for recomputation.
    pub fn set_matrix(
        &mut self,
        address: SimpleCellAddress,
        ast: Arc<Ast>,
        version: u64,
        (width, height): (u32, u32),
        dependencies: &[Dependency],
    ) -> (VertexId, Vec<VertexId>) {
        let matrix = MatrixVertex {
            ast,
            address,
            version,
            width,
            height,
            value: CellValue::Empty,
        };
        let area = matrix.range();
        let id = self.add_vertex(VertexKind::Matrix(matrix), Some(address));
        let mut readers = Vec::new();
        for (cell, old) in self.cells_in(&area) {
            if let Some(previous) = self.remove_vertex_keep_readers(old) {
                for reader in previous {
                    if !self.vertex(reader).is_some_and(Vertex::is_range) {
                        self.add_edge(id, reader);
                    }
                    readers.push(reader);
                }
            }
            self.cells.remove(&cell);
        }
        let covered: Vec<SimpleCellAddress> = area.addresses().collect();
        for cell in &covered {
            self.cells.insert(*cell, id);
        }
        self.link_into_ranges(id, &covered);
        self.set_dependencies(id, dependencies);
        (id, readers)
    }

    /// Clear a cell. Returns the vertices that read it.
    pub fn clear_cell(&mut self, address: &SimpleCellAddress) -> Vec<VertexId> {
        let Some(id) = self.get_cell(address) else {
            return Vec::new();
        };
        let readers = self.dependents(id);
        self.blank_out(id);
        readers
    }

    /// Drop an array formula with every cell it covers. Returns its readers;
    /// formulas among them need their placeholders back.
    pub fn remove_matrix(&mut self, id: VertexId) -> Vec<VertexId> {
        if !self.vertex(id).is_some_and(|v| matches!(v.kind, VertexKind::Matrix(_))) {
            return Vec::new();
        }
        let readers = self.dependents(id);
        self.set_dependencies(id, &[]);
        self.remove_vertex(id);
        readers
    }

    /// Turn a cell vertex into a placeholder, dropping it if nothing reads it.
    fn blank_out(&mut self, id: VertexId) {
        if self.vertex(id).is_some_and(Vertex::is_formula) {
            self.set_dependencies(id, &[]);
        }
        self.unlink_from_ranges(id);
        let Some(v) = self.vertex_mut(id) else {
            return;
        };
        if v.dependents.is_empty() {
            self.remove_vertex(id);
        } else {
            v.kind = VertexKind::Empty;
        }
    }

    fn claim_cell(&mut self, address: SimpleCellAddress) -> VertexId {
        if let Some(id) = self.get_cell(&address) {
            if self.vertex(id).is_some_and(Vertex::is_formula) {
                self.set_dependencies(id, &[]);
            }
            return id;
        }
        let id = self.add_vertex(VertexKind::Empty, Some(address));
        self.cells.insert(address, id);
        id
    }

    fn remove_vertex_keep_readers(&mut self, id: VertexId) -> Option<Vec<VertexId>> {
        let readers = self.dependents(id);
        if self.vertex(id).is_some_and(Vertex::is_formula) {
            self.set_dependencies(id, &[]);
        }
        self.remove_vertex(id)?;
        Some(readers)
    }

    /* ───────────────────────── dependencies ───────────────────────── */

    /// Replace the dependency set of `id`. Placeholders and range vertices
    /// left without readers are collected.
    pub fn set_dependencies(&mut self, id: VertexId, dependencies: &[Dependency]) {
        let old: Vec<VertexId> = match self.vertex_mut(id) {
            Some(v) => v.dependencies.drain().collect(),
            None => return,
        };
        for dep in &old {
            if let Some(v) = self.vertex_mut(*dep) {
                v.dependents.remove(&id);
            }
        }
        for dependency in dependencies {
            let dep = match dependency {
                Dependency::Cell(address) => self.fetch_or_create_cell(*address),
                Dependency::Range(range) => self.fetch_or_create_range(*range),
            };
            self.add_edge(dep, id);
        }
        self.collect_garbage(old);
    }

    pub fn fetch_or_create_cell(&mut self, address: SimpleCellAddress) -> VertexId {
        if let Some(id) = self.get_cell(&address) {
            return id;
        }
        let id = self.add_vertex(VertexKind::Empty, Some(address));
        self.cells.insert(address, id);
        id
    }

    pub fn fetch_or_create_range(&mut self, range: AbsoluteCellRange) -> VertexId {
        if let Some(id) = self.get_range(&range) {
            return id;
        }
        let id = self.add_vertex(VertexKind::Range(RangeVertex::new(range)), None);
        self.ranges.insert(range, id);
        self.connect_range(id);
        id
    }

    /// Recompute what a range vertex reads: the range one row shorter plus
    /// the last row when that shorter range exists, every filled cell otherwise.
    pub(crate) fn connect_range(&mut self, id: VertexId) {
        let range = match self.vertex(id).map(|v| &v.kind) {
            Some(VertexKind::Range(r)) => r.range,
            _ => return,
        };
        let old: Vec<VertexId> = match self.vertex_mut(id) {
            Some(v) => v.dependencies.drain().collect(),
            None => return,
        };
        for dep in &old {
            if let Some(v) = self.vertex_mut(*dep) {
                v.dependents.remove(&id);
            }
        }

        let smaller = range.without_last_row().and_then(|s| self.get_range(&s));
        let sources: Vec<VertexId> = match smaller {
            Some(smaller) => {
                let mut sources = vec![smaller];
                sources.extend(range.last_row().filter_map(|a| self.get_cell(&a)));
                sources
            }
            None => self.cells_in(&range).into_iter().map(|(_, id)| id).collect(),
        };
        for source in sources {
            if source != id && !self.vertex(source).is_some_and(Vertex::is_blank) {
                self.add_edge(source, id);
            }
        }
        self.collect_garbage(old);
    }

    /// Attach a newly filled cell to every range covering it, skipping
    /// ranges that already see it through their shorter range.
    fn link_into_ranges(&mut self, id: VertexId, addresses: &[SimpleCellAddress]) {
        let covering: Vec<(AbsoluteCellRange, VertexId)> = self
            .ranges
            .iter()
            .filter(|(r, _)| addresses.iter().any(|a| r.contains(a)))
            .map(|(r, rid)| (*r, *rid))
            .collect();
        for (range, rid) in covering {
            let seen_through_smaller = range
                .without_last_row()
                .filter(|s| addresses.iter().all(|a| s.contains(a)))
                .and_then(|s| self.get_range(&s))
                .is_some_and(|sid| self.exists_edge(sid, rid));
            if !seen_through_smaller {
                self.add_edge(id, rid);
            }
        }
    }

    fn unlink_from_ranges(&mut self, id: VertexId) {
        let range_readers: Vec<VertexId> = self
            .dependents(id)
            .into_iter()
            .filter(|d| self.vertex(*d).is_some_and(Vertex::is_range))
            .collect();
        for rid in range_readers {
            self.remove_edge(id, rid);
        }
    }

    /// Drop placeholders and range vertices that nothing reads any more,
    /// following the chain into what they read.
    pub fn collect_garbage(&mut self, candidates: impl IntoIterator<Item = VertexId>) {
        let mut stack: Vec<VertexId> = candidates.into_iter().collect();
        while let Some(id) = stack.pop() {
            let Some(vertex) = self.vertex(id) else {
                continue;
            };
            if !vertex.dependents.is_empty() {
                continue;
            }
            match vertex.kind {
                VertexKind::Range(_) => {
                    stack.extend(vertex.dependencies.iter().copied());
                    self.remove_vertex(id);
                }
                VertexKind::Empty if id != self.empty => {
                    self.remove_vertex(id);
                }
                _ => {}
            }
        }
    }

    /* ───────────────────────── structural edits ───────────────────────── */

    /// Insert `span` rows or columns. Ranges straddling the insertion point grow.
    pub fn insert_span(&mut self, axis: Axis, span: Span) -> GraphEdit {
        self.shift_along(axis, span, true)
    }

    /// Remove `span` rows or columns with everything in them.
    pub fn remove_span(&mut self, axis: Axis, span: Span) -> GraphEdit {
        self.shift_along(axis, span, false)
    }

    fn shift_along(&mut self, axis: Axis, span: Span, insert: bool) -> GraphEdit {
        let mut edit = GraphEdit::default();
        let sheet = span.sheet;

        if !insert {
            let doomed: FxHashSet<VertexId> = self
                .cells
                .iter()
                .filter(|(a, _)| a.sheet == sheet && span.contains(axis.of(a)))
                .map(|(_, id)| *id)
                .collect();
            self.remove_cells(doomed, &mut edit);
        }

        let moved: Vec<(SimpleCellAddress, VertexId)> = self
            .cells
            .iter()
            .filter(|(a, _)| a.sheet == sheet)
            .map(|(a, id)| (*a, *id))
            .collect();
        let remapped = moved.into_iter().filter_map(|(address, id)| {
            let index = shift_index(axis.of(&address) as i64, &span, insert)?;
            let index = index.clamp(0, axis.limit() as i64) as u32;
            Some((address, axis.with(address, index), id))
        });
        self.rekey_cells(remapped.collect());

        let mut to_reconnect = Vec::new();
        let mut rekeyed = Vec::new();
        for (range, rid) in self.ranges_on_sheet(sheet) {
            if axis.spans_whole_axis(&range) {
                continue;
            }
            let lo = axis.of(&range.start) as i64;
            let hi = axis.of(&range.end) as i64;
            match shift_interval(lo, hi, &span, insert) {
                None => {
                    if let Some(v) = self.vertex(rid) {
                        edit.absorb_dependents(v);
                    }
                    let readers = self.dependents(rid);
                    self.remove_vertex(rid);
                    self.collect_garbage(readers);
                }
                Some((new_lo, new_hi)) => {
                    let limit = axis.limit() as i64;
                    let new_range = AbsoluteCellRange {
                        start: axis.with(range.start, new_lo.clamp(0, limit) as u32),
                        end: axis.with(range.end, new_hi.clamp(0, limit) as u32),
                    };
                    if new_hi - new_lo != hi - lo {
                        edit.changed.push(rid);
                        to_reconnect.push(rid);
                    }
                    if new_range != range {
                        rekeyed.push((range, new_range, rid));
                    }
                }
            }
        }
        to_reconnect.extend(self.rekey_ranges(rekeyed, &mut edit));
        for rid in to_reconnect {
            self.connect_range(rid);
        }
        edit
    }

    /// Move the cells of `source` onto `target`, a rectangle of the same
    /// shape, overwriting whatever sits there.
    pub fn move_cells(
        &mut self,
        source: &AbsoluteCellRange,
        target: &AbsoluteCellRange,
    ) -> GraphEdit {
        let mut edit = GraphEdit::default();
        let dx = target.start.col as i64 - source.start.col as i64;
        let dy = target.start.row as i64 - source.start.row as i64;
        let to_sheet = target.sheet();

        let overwritten: FxHashSet<VertexId> = self
            .cells_in(target)
            .into_iter()
            .filter(|(a, _)| !source.contains(a))
            .map(|(_, id)| id)
            .collect();
        for id in &overwritten {
            if let Some(v) = self.vertex(*id) {
                edit.suspects.extend(v.dependents.iter().copied());
            }
        }
        self.remove_cells(overwritten, &mut edit);

        let moving = self.cells_in(source);
        let mut remapped = Vec::with_capacity(moving.len());
        for (address, id) in moving {
            let Some(new_address) = address.moved(to_sheet, dx, dy) else {
                continue;
            };
            if self.vertex(id).is_some_and(Vertex::is_formula) {
                edit.suspects.push(id);
                edit.changed.push(id);
            }
            remapped.push((address, new_address, id));
        }
        self.rekey_cells(remapped);

        let mut rekeyed = Vec::new();
        let mut to_reconnect = Vec::new();
        let snapshot: Vec<(AbsoluteCellRange, VertexId)> =
            self.ranges.iter().map(|(r, id)| (*r, *id)).collect();
        for (range, rid) in snapshot {
            if source.contains_range(&range) {
                if let Some(new_range) = range.shifted(to_sheet, dx, dy) {
                    rekeyed.push((range, new_range, rid));
                }
            } else if range.intersects(source) || range.intersects(target) {
                edit.changed.push(rid);
                to_reconnect.push(rid);
            }
        }
        to_reconnect.extend(self.rekey_ranges(rekeyed, &mut edit));
        for rid in to_reconnect {
            self.connect_range(rid);
        }
        edit.suspects.retain(|id| self.vertex(*id).is_some_and(Vertex::is_formula));
        edit
    }

    /// Drop every cell and range on `sheet`.
    pub fn remove_sheet(&mut self, sheet: SheetId) -> GraphEdit {
        let mut edit = GraphEdit::default();
        let doomed: FxHashSet<VertexId> = self
            .cells
            .iter()
            .filter(|(a, _)| a.sheet == sheet)
            .map(|(_, id)| *id)
            .collect();
        self.remove_cells(doomed, &mut edit);
        for (_, rid) in self.ranges_on_sheet(sheet) {
            if let Some(v) = self.vertex(rid) {
                edit.absorb_dependents(v);
            }
            let readers = self.dependents(rid);
            self.remove_vertex(rid);
            self.collect_garbage(readers);
        }
        edit.changed.retain(|id| self.contains(*id));
        edit
    }

    /// Blank every cell on `sheet`, keeping placeholders that other sheets read.
    pub fn clear_sheet(&mut self, sheet: SheetId) -> GraphEdit {
        let mut edit = GraphEdit::default();
        let cells = self.cells_on_sheet(sheet);
        let mut seen = FxHashSet::default();
        // Formulas first, so their dependencies are gone before values are judged.
        let (formulas, plain): (Vec<_>, Vec<_>) = cells
            .into_iter()
            .filter(|(_, id)| seen.insert(*id))
            .partition(|(_, id)| self.vertex(*id).is_some_and(Vertex::is_formula));
        for (address, id) in formulas.into_iter().chain(plain) {
            let Some(vertex) = self.vertex(id) else {
                continue;
            };
            if let Some(value) = vertex.value() {
                edit.removed_values.push((address, value.clone()));
            }
            edit.absorb_dependents(vertex);
            if self.vertex(id).is_some_and(|v| matches!(v.kind, VertexKind::Matrix(_))) {
                // Readers get placeholders back when their edges are rebuilt.
                if let Some(v) = self.vertex(id) {
                    edit.suspects.extend(v.dependents.iter().copied());
                }
                self.set_dependencies(id, &[]);
                self.remove_vertex(id);
            } else {
                self.blank_out(id);
            }
        }
        for (_, rid) in self.ranges_on_sheet(sheet) {
            self.connect_range(rid);
        }
        edit.changed.retain(|id| self.contains(*id));
        edit.suspects.retain(|id| self.contains(*id));
        edit
    }

    /// Re-home every cell and range of `from` onto the empty sheet `to`.
    pub fn merge_sheet(&mut self, from: SheetId, to: SheetId) {
        let moved: Vec<(SimpleCellAddress, SimpleCellAddress, VertexId)> = self
            .cells_on_sheet(from)
            .into_iter()
            .map(|(a, id)| (a, SimpleCellAddress::new(to, a.col, a.row), id))
            .collect();
        self.rekey_cells(moved);

        let mut edit = GraphEdit::default();
        let rekeyed: Vec<_> = self
            .ranges_on_sheet(from)
            .into_iter()
            .map(|(r, id)| {
                let new_range = AbsoluteCellRange {
                    start: SimpleCellAddress::new(to, r.start.col, r.start.row),
                    end: SimpleCellAddress::new(to, r.end.col, r.end.row),
                };
                (r, new_range, id)
            })
            .collect();
        self.rekey_ranges(rekeyed, &mut edit);
    }

    fn remove_cells(&mut self, doomed: FxHashSet<VertexId>, edit: &mut GraphEdit) {
        let mut doomed: Vec<VertexId> = doomed.into_iter().collect();
        doomed.sort_unstable();
        for id in &doomed {
            let Some(vertex) = self.vertex(*id) else {
                continue;
            };
            if let (Some(cell), Some(value)) = (vertex.cell, vertex.value()) {
                edit.removed_values.push((cell, value.clone()));
            }
            edit.absorb_dependents(vertex);
        }
        let mut orphans = Vec::new();
        for id in &doomed {
            if let Some(vertex) = self.remove_vertex(*id) {
                orphans.extend(vertex.dependencies);
            }
        }
        self.collect_garbage(orphans);
        edit.changed.retain(|id| self.contains(*id));
    }

    fn rekey_cells(&mut self, moves: Vec<(SimpleCellAddress, SimpleCellAddress, VertexId)>) {
        for (old, _, id) in &moves {
            if self.cells.get(old) == Some(id) {
                self.cells.remove(old);
            }
        }
        for (old, new, id) in moves {
            self.cells.insert(new, id);
            if let Some(v) = self.vertex_mut(id) {
                if v.cell == Some(old) {
                    v.cell = Some(new);
                }
            }
        }
    }

    /// Rename range vertices. Two vertices landing on the same rectangle are
    /// merged into one; the survivors are returned for reconnection.
    fn rekey_ranges(
        &mut self,
        moves: Vec<(AbsoluteCellRange, AbsoluteCellRange, VertexId)>,
        edit: &mut GraphEdit,
    ) -> Vec<VertexId> {
        let mut survivors = Vec::new();
        for (old, _, id) in &moves {
            if self.ranges.get(old) == Some(id) {
                self.ranges.remove(old);
            }
        }
        for (_, new, id) in moves {
            if let Some(VertexKind::Range(r)) = self.vertex_mut(id).map(|v| &mut v.kind) {
                r.range = new;
            }
            match self.ranges.get(&new).copied() {
                Some(existing) if existing != id => {
                    for reader in self.dependents(id) {
                        self.add_edge(existing, reader);
                    }
                    let old_deps = self.dependencies(id);
                    self.remove_vertex(id);
                    self.collect_garbage(old_deps);
                    edit.changed.push(existing);
                    survivors.push(existing);
                }
                _ => {
                    self.ranges.insert(new, id);
                }
            }
        }
        survivors
    }

    // Testing accessors
    #[cfg(test)]
    pub(crate) fn address_map(&self) -> &FxHashMap<SimpleCellAddress, VertexId> {
        &self.cells
    }
}
