//! Cell-level error values.
//!
//! - **`ErrorType`** : the closed set of error codes a cell can hold
//! - **`CellError`** : a code plus an optional human explanation
//!
//! These are *values*, not Rust errors in the `?` sense: they are stored in
//! cells, flow through formulas and compare like any other value.

use std::{error::Error, fmt};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// All error codes a cell can evaluate to.
///
/// **Note:** names are CamelCase while `Display` renders the spreadsheet
/// spelling (`#DIV/0!`, `#CYCLE!`, …).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorType {
    DivByZero,
    Name,
    Value,
    Num,
    Na,
    Cycle,
    Ref,
    Error,
    Spill,
    Lic,
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DivByZero => "#DIV/0!",
            Self::Name => "#NAME?",
            Self::Value => "#VALUE!",
            Self::Num => "#NUM!",
            Self::Na => "#N/A",
            Self::Cycle => "#CYCLE!",
            Self::Ref => "#REF!",
            Self::Error => "#ERROR!",
            Self::Spill => "#SPILL!",
            Self::Lic => "#LIC!",
        })
    }
}

impl ErrorType {
    /// Case-insensitive inverse of `Display`.
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.trim().to_ascii_uppercase().as_str() {
            "#DIV/0!" => Self::DivByZero,
            "#NAME?" => Self::Name,
            "#VALUE!" => Self::Value,
            "#NUM!" => Self::Num,
            "#N/A" => Self::Na,
            "#CYCLE!" => Self::Cycle,
            "#REF!" => Self::Ref,
            "#ERROR!" => Self::Error,
            "#SPILL!" => Self::Spill,
            "#LIC!" => Self::Lic,
            _ => return None,
        })
    }
}

/// An error value as stored in a cell.
///
/// Equality and hashing include the message, so two `#REF!` values with
/// different explanations are distinct keys; use [`CellError::kind`] to
/// compare codes only.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellError {
    pub kind: ErrorType,
    pub message: Option<String>,
}

/* ───────────────────── Constructors & helpers ─────────────────────── */

impl From<ErrorType> for CellError {
    fn from(kind: ErrorType) -> Self {
        Self {
            kind,
            message: None,
        }
    }
}

impl CellError {
    pub fn new(kind: ErrorType) -> Self {
        kind.into()
    }

    /// Attach a human-readable explanation.
    pub fn with_message<S: Into<String>>(mut self, msg: S) -> Self {
        self.message = Some(msg.into());
        self
    }

    pub fn reference() -> Self {
        Self::new(ErrorType::Ref)
    }

    pub fn cycle() -> Self {
        Self::new(ErrorType::Cycle)
    }
}

/* ───────────────────────── Display / Error ────────────────────────── */

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl Error for CellError {}
