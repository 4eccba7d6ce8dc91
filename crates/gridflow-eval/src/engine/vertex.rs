use std::sync::Arc;

use gridflow_common::{AbsoluteCellRange, Ast, CellValue, SimpleCellAddress};
use rustc_hash::{FxHashMap, FxHashSet};

/// Stable handle into the graph arena. Slots are never reused, so a handle
/// held across a mutation either still names the same vertex or nothing.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct VertexId(pub(crate) u32);

impl VertexId {
    pub(crate) fn new(id: u32) -> Self {
        Self(id)
    }

    pub(crate) fn as_index(self) -> usize {
        self.0 as usize
    }
}

/// A formula cell. `ast` and `address` are only current as of `version`;
/// read them through the lazy transformation service.
#[derive(Debug, Clone)]
pub struct FormulaVertex {
    pub ast: Arc<Ast>,
    pub address: SimpleCellAddress,
    pub version: u64,
    pub value: CellValue,
}

/// An array formula covering `width x height` cells from `address`.
/// Kept current eagerly after every structural change.
#[derive(Debug, Clone)]
pub struct MatrixVertex {
    pub ast: Arc<Ast>,
    pub address: SimpleCellAddress,
    pub version: u64,
    pub width: u32,
    pub height: u32,
    pub value: CellValue,
}

impl MatrixVertex {
    pub fn range(&self) -> AbsoluteCellRange {
        AbsoluteCellRange {
            start: self.address,
            end: SimpleCellAddress::new(
                self.address.sheet,
                self.address.col + self.width - 1,
                self.address.row + self.height - 1,
            ),
        }
    }

    pub fn value_at(&self, address: SimpleCellAddress) -> CellValue {
        let row = (address.row - self.address.row) as usize;
        let col = (address.col - self.address.col) as usize;
        self.value.array_element(row, col)
    }
}

/// Shared aggregate cache for one exact range.
#[derive(Debug, Clone)]
pub struct RangeVertex {
    pub range: AbsoluteCellRange,
    function_cache: FxHashMap<String, CellValue>,
}

impl RangeVertex {
    pub fn new(range: AbsoluteCellRange) -> Self {
        Self {
            range,
            function_cache: FxHashMap::default(),
        }
    }

    pub fn cached(&self, function: &str) -> Option<&CellValue> {
        self.function_cache.get(function)
    }

    pub fn store(&mut self, function: &str, value: CellValue) {
        self.function_cache.insert(function.to_string(), value);
    }

    pub fn clear_cache(&mut self) {
        self.function_cache.clear();
    }
}

#[derive(Debug, Clone)]
pub enum VertexKind {
    /// Blank cell that something refers to. Unreferenced blanks have no vertex.
    Empty,
    Value(CellValue),
    Formula(FormulaVertex),
    Matrix(MatrixVertex),
    Range(RangeVertex),
}

#[derive(Debug, Clone)]
pub struct Vertex {
    pub kind: VertexKind,
    /// Current grid position (anchor for matrices), kept in step with the
    /// address map. `None` for range vertices and the shared empty cell.
    pub(crate) cell: Option<SimpleCellAddress>,
    /// Vertices this one reads.
    pub(crate) dependencies: FxHashSet<VertexId>,
    /// Vertices that read this one.
    pub(crate) dependents: FxHashSet<VertexId>,
}

impl Vertex {
    pub fn new(kind: VertexKind, cell: Option<SimpleCellAddress>) -> Self {
        Self {
            kind,
            cell,
            dependencies: FxHashSet::default(),
            dependents: FxHashSet::default(),
        }
    }

    pub fn cell(&self) -> Option<SimpleCellAddress> {
        self.cell
    }

    pub fn dependencies(&self) -> &FxHashSet<VertexId> {
        &self.dependencies
    }

    pub fn dependents(&self) -> &FxHashSet<VertexId> {
        &self.dependents
    }

    pub fn is_formula(&self) -> bool {
        matches!(self.kind, VertexKind::Formula(_) | VertexKind::Matrix(_))
    }

    pub fn is_range(&self) -> bool {
        matches!(self.kind, VertexKind::Range(_))
    }

    /// Blank or missing content; such a vertex never feeds a range.
    pub fn is_blank(&self) -> bool {
        matches!(self.kind, VertexKind::Empty)
    }

    /// The value a plain cell holds or a formula last computed.
    pub fn value(&self) -> Option<&CellValue> {
        match &self.kind {
            VertexKind::Value(v) => Some(v),
            VertexKind::Formula(f) => Some(&f.value),
            VertexKind::Matrix(m) => Some(&m.value),
            VertexKind::Empty | VertexKind::Range(_) => None,
        }
    }
}
