use std::{
    fmt::{self, Display},
    hash::{Hash, Hasher},
};

use crate::{CellError, ErrorType};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The value held by, or computed for, a cell.
///
/// Hashing and equality are structural, numbers compared by normalized bit
/// pattern (signed zeros and every NaN collapse to one value), so a value can
/// key the column search index directly.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Boolean(bool),
    /// Result of an array formula; never stored in a plain value cell.
    Array(Vec<Vec<CellValue>>),
    Empty,
    Error(CellError),
}

impl Hash for CellValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            CellValue::Number(n) => normalized_bits(*n).hash(state),
            CellValue::Text(s) => s.hash(state),
            CellValue::Boolean(b) => b.hash(state),
            CellValue::Array(a) => a.hash(state),
            CellValue::Empty => {}
            CellValue::Error(e) => e.hash(state),
        }
    }
}

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CellValue::Number(a), CellValue::Number(b)) => {
                normalized_bits(*a) == normalized_bits(*b)
            }
            (CellValue::Text(a), CellValue::Text(b)) => a == b,
            (CellValue::Boolean(a), CellValue::Boolean(b)) => a == b,
            (CellValue::Array(a), CellValue::Array(b)) => a == b,
            (CellValue::Empty, CellValue::Empty) => true,
            (CellValue::Error(a), CellValue::Error(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for CellValue {}

// `0.0 == -0.0` and all NaN payloads must compare and hash identically.
fn normalized_bits(n: f64) -> u64 {
    if n == 0.0 {
        0
    } else if n.is_nan() {
        f64::NAN.to_bits()
    } else {
        n.to_bits()
    }
}

impl Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            CellValue::Error(e) => write!(f, "{}", e.kind),
            CellValue::Array(a) => write!(f, "{a:?}"),
            CellValue::Empty => write!(f, ""),
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Boolean(b)
    }
}

impl From<CellError> for CellValue {
    fn from(e: CellError) -> Self {
        CellValue::Error(e)
    }
}

impl From<ErrorType> for CellValue {
    fn from(kind: ErrorType) -> Self {
        CellValue::Error(CellError::new(kind))
    }
}

impl CellValue {
    pub fn error(kind: ErrorType) -> Self {
        kind.into()
    }

    pub fn is_error(&self) -> bool {
        matches!(self, CellValue::Error(_))
    }

    pub fn error_kind(&self) -> Option<ErrorType> {
        match self {
            CellValue::Error(e) => Some(e.kind),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric coercion as used by arithmetic: blanks are zero, booleans are
    /// 0/1, numeric text parses.
    pub fn coerce_number(&self) -> Result<f64, CellError> {
        match self {
            CellValue::Number(n) => Ok(*n),
            CellValue::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            CellValue::Empty => Ok(0.0),
            CellValue::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| CellError::new(ErrorType::Value)),
            CellValue::Error(e) => Err(e.clone()),
            CellValue::Array(a) => match a.first().and_then(|row| row.first()) {
                Some(v) => v.coerce_number(),
                None => Err(CellError::new(ErrorType::Value)),
            },
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            CellValue::Boolean(b) => *b,
            CellValue::Number(n) => *n != 0.0,
            CellValue::Text(s) => !s.is_empty(),
            CellValue::Array(arr) => !arr.is_empty(),
            CellValue::Error(_) | CellValue::Empty => false,
        }
    }

    /// Element of an array result at `(row, col)`; scalars broadcast.
    pub fn array_element(&self, row: usize, col: usize) -> CellValue {
        match self {
            CellValue::Array(rows) => rows
                .get(row)
                .and_then(|r| r.get(col))
                .cloned()
                .unwrap_or_else(|| CellValue::error(ErrorType::Na)),
            scalar => scalar.clone(),
        }
    }

    /// Magnitude of the change from `self` to `next`, used for convergence.
    /// Non-numeric changes are infinite; identical values are zero.
    pub fn distance(&self, next: &CellValue) -> f64 {
        match (self, next) {
            (CellValue::Number(a), CellValue::Number(b)) => {
                let d = (a - b).abs();
                if d.is_nan() { f64::INFINITY } else { d }
            }
            (a, b) if a == b => 0.0,
            _ => f64::INFINITY,
        }
    }
}
