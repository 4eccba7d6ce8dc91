//! Contract violations reported by mutating engine operations.
//!
//! Cell-level failures (`#REF!`, `#CYCLE!`, …) are values, not errors; see
//! [`gridflow_common::CellError`].

use gridflow_common::{SheetId, SimpleCellAddress};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("address {0} is outside the grid or on an unknown sheet")]
    InvalidAddress(SimpleCellAddress),

    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("span must cover at least one row or column")]
    NonPositiveSpan,

    #[error("no sheet with id {0}")]
    NoSuchSheet(SheetId),

    #[error("sheet name '{0}' is already taken")]
    SheetNameTaken(String),

    #[error("sheet {0} is not empty")]
    SheetNotEmpty(SheetId),

    #[error("operation would split the array formula covering {0}")]
    MatrixIntersection(SimpleCellAddress),

    #[error("operation would push content past the edge of the sheet")]
    SheetSizeLimit,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("cannot move rows or columns into the block being moved")]
    InvalidMoveTarget,
}

pub type Result<T> = std::result::Result<T, EngineError>;
