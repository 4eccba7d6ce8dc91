//! Formula syntax trees as handed over by an external parser.
//!
//! The engine never interprets syntax. It only needs to find, resolve and
//! rewrite the references embedded in a tree, which is what this module offers.

use smallvec::SmallVec;

use crate::address::{CellAddress, ColumnAddress, RowAddress, SimpleCellAddress};
use crate::range::AbsoluteCellRange;
use crate::{CellError, ErrorType};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Minus,
    Plus,
    Percent,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum Ast {
    Number(f64),
    Text(String),
    Boolean(bool),
    /// A literal error, including `#REF!` left behind by structural edits.
    Error(CellError),
    CellReference(CellAddress),
    CellRange {
        start: CellAddress,
        end: CellAddress,
    },
    ColumnRange {
        start: ColumnAddress,
        end: ColumnAddress,
    },
    RowRange {
        start: RowAddress,
        end: RowAddress,
    },
    Function {
        name: String,
        args: Vec<Ast>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Ast>,
        right: Box<Ast>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Ast>,
    },
    Array(Vec<Vec<Ast>>),
}

/// What a formula reads, resolved against its own position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dependency {
    Cell(SimpleCellAddress),
    Range(AbsoluteCellRange),
}

impl Ast {
    pub fn ref_error() -> Self {
        Ast::Error(CellError::new(ErrorType::Ref))
    }

    pub fn binary(op: BinaryOp, left: Ast, right: Ast) -> Self {
        Ast::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn function(name: &str, args: Vec<Ast>) -> Self {
        Ast::Function {
            name: name.to_ascii_uppercase(),
            args,
        }
    }

    /// Every reference resolved against `base`, deduplicated in first-seen
    /// order. References that fall outside the grid are skipped; they
    /// evaluate to `#REF!` and have nothing to depend on.
    pub fn dependencies(&self, base: SimpleCellAddress) -> SmallVec<[Dependency; 4]> {
        let mut out = SmallVec::new();
        self.collect_dependencies(base, &mut out);
        out
    }

    fn collect_dependencies(&self, base: SimpleCellAddress, out: &mut SmallVec<[Dependency; 4]>) {
        let dep = match self {
            Ast::CellReference(addr) => addr.to_simple(base).map(Dependency::Cell),
            Ast::CellRange { .. } | Ast::ColumnRange { .. } | Ast::RowRange { .. } => {
                self.resolve_range(base).map(Dependency::Range)
            }
            Ast::Function { args, .. } => {
                for arg in args {
                    arg.collect_dependencies(base, out);
                }
                None
            }
            Ast::Binary { left, right, .. } => {
                left.collect_dependencies(base, out);
                right.collect_dependencies(base, out);
                None
            }
            Ast::Unary { operand, .. } => {
                operand.collect_dependencies(base, out);
                None
            }
            Ast::Array(rows) => {
                for node in rows.iter().flatten() {
                    node.collect_dependencies(base, out);
                }
                None
            }
            Ast::Number(_) | Ast::Text(_) | Ast::Boolean(_) | Ast::Error(_) => None,
        };
        if let Some(dep) = dep {
            if !out.contains(&dep) {
                out.push(dep);
            }
        }
    }

    /// Resolve a range node against `base`. `None` for non-range nodes and for
    /// ranges whose corners leave the grid or straddle sheets.
    pub fn resolve_range(&self, base: SimpleCellAddress) -> Option<AbsoluteCellRange> {
        match self {
            Ast::CellRange { start, end } => {
                AbsoluteCellRange::new(start.to_simple(base)?, end.to_simple(base)?).ok()
            }
            Ast::ColumnRange { start, end } => {
                let sheet = start.sheet.resolve(base.sheet);
                if end.sheet.resolve(base.sheet) != sheet {
                    return None;
                }
                let first = start.col.resolve(base.col);
                let last = end.col.resolve(base.col);
                let probe = |c: i64| SimpleCellAddress::from_signed(sheet, c, 0);
                Some(AbsoluteCellRange::columns(sheet, probe(first)?.col, probe(last)?.col))
            }
            Ast::RowRange { start, end } => {
                let sheet = start.sheet.resolve(base.sheet);
                if end.sheet.resolve(base.sheet) != sheet {
                    return None;
                }
                let first = start.row.resolve(base.row);
                let last = end.row.resolve(base.row);
                let probe = |r: i64| SimpleCellAddress::from_signed(sheet, 0, r);
                Some(AbsoluteCellRange::rows(sheet, probe(first)?.row, probe(last)?.row))
            }
            _ => None,
        }
    }

    /// Whether a `#REF!` literal appears anywhere in the tree.
    pub fn contains_ref_error(&self) -> bool {
        match self {
            Ast::Error(e) => e.kind == ErrorType::Ref,
            Ast::Function { args, .. } => args.iter().any(Ast::contains_ref_error),
            Ast::Binary { left, right, .. } => left.contains_ref_error() || right.contains_ref_error(),
            Ast::Unary { operand, .. } => operand.contains_ref_error(),
            Ast::Array(rows) => rows.iter().flatten().any(Ast::contains_ref_error),
            _ => false,
        }
    }
}
