use crate::address::{MAX_COL, MAX_ROW, SheetId, SimpleCellAddress};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A resolved rectangle on one sheet.
///
/// Whole-column ranges (`A:C`) end at [`MAX_ROW`], whole-row ranges (`2:4`)
/// end at [`MAX_COL`].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AbsoluteCellRange {
    pub start: SimpleCellAddress,
    pub end: SimpleCellAddress,
}

impl AbsoluteCellRange {
    /// Normalizes corner order. Both corners must be on the same sheet.
    pub fn new(a: SimpleCellAddress, b: SimpleCellAddress) -> Result<Self, &'static str> {
        if a.sheet != b.sheet {
            return Err("Range corners must be on the same sheet");
        }
        if !a.is_within_grid() || !b.is_within_grid() {
            return Err("Range corner outside of the grid");
        }
        Ok(Self {
            start: SimpleCellAddress::new(a.sheet, a.col.min(b.col), a.row.min(b.row)),
            end: SimpleCellAddress::new(a.sheet, a.col.max(b.col), a.row.max(b.row)),
        })
    }

    /// `width x height` block anchored at `start`.
    pub fn spanning(start: SimpleCellAddress, width: u32, height: u32) -> Result<Self, &'static str> {
        if width == 0 || height == 0 {
            return Err("Range must cover at least one cell");
        }
        let end = start
            .moved(start.sheet, width as i64 - 1, height as i64 - 1)
            .ok_or("Range corner outside of the grid")?;
        Ok(Self { start, end })
    }

    pub fn single(address: SimpleCellAddress) -> Self {
        Self {
            start: address,
            end: address,
        }
    }

    pub fn columns(sheet: SheetId, first: u32, last: u32) -> Self {
        Self {
            start: SimpleCellAddress::new(sheet, first.min(last), 0),
            end: SimpleCellAddress::new(sheet, first.max(last), MAX_ROW),
        }
    }

    pub fn rows(sheet: SheetId, first: u32, last: u32) -> Self {
        Self {
            start: SimpleCellAddress::new(sheet, 0, first.min(last)),
            end: SimpleCellAddress::new(sheet, MAX_COL, first.max(last)),
        }
    }

    #[inline]
    pub fn sheet(&self) -> SheetId {
        self.start.sheet
    }

    pub fn width(&self) -> u32 {
        self.end.col - self.start.col + 1
    }

    pub fn height(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    pub fn size(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn is_whole_columns(&self) -> bool {
        self.start.row == 0 && self.end.row == MAX_ROW
    }

    pub fn is_whole_rows(&self) -> bool {
        self.start.col == 0 && self.end.col == MAX_COL
    }

    pub fn is_finite(&self) -> bool {
        !self.is_whole_columns() && !self.is_whole_rows()
    }

    pub fn contains(&self, address: &SimpleCellAddress) -> bool {
        address.sheet == self.sheet()
            && address.col >= self.start.col
            && address.col <= self.end.col
            && address.row >= self.start.row
            && address.row <= self.end.row
    }

    pub fn contains_range(&self, other: &AbsoluteCellRange) -> bool {
        self.contains(&other.start) && self.contains(&other.end)
    }

    pub fn intersects(&self, other: &AbsoluteCellRange) -> bool {
        self.sheet() == other.sheet()
            && self.start.col <= other.end.col
            && other.start.col <= self.end.col
            && self.start.row <= other.end.row
            && other.start.row <= self.end.row
    }

    pub fn col_in_range(&self, col: u32) -> bool {
        col >= self.start.col && col <= self.end.col
    }

    pub fn row_in_range(&self, row: u32) -> bool {
        row >= self.start.row && row <= self.end.row
    }

    /// Same shape `(dx, dy)` away, possibly on another sheet; `None` if it
    /// would leave the grid.
    pub fn shifted(&self, to_sheet: SheetId, dx: i64, dy: i64) -> Option<Self> {
        Some(Self {
            start: self.start.moved(to_sheet, dx, dy)?,
            end: self.end.moved(to_sheet, dx, dy)?,
        })
    }

    /// The range one row shorter, used to chain aggregates (`A1:A9` feeds `A1:A10`).
    pub fn without_last_row(&self) -> Option<Self> {
        if self.height() < 2 || !self.is_finite() {
            return None;
        }
        Some(Self {
            start: self.start,
            end: SimpleCellAddress::new(self.sheet(), self.end.col, self.end.row - 1),
        })
    }

    /// Cells of the last row, left to right.
    pub fn last_row(&self) -> impl Iterator<Item = SimpleCellAddress> + '_ {
        let row = self.end.row;
        (self.start.col..=self.end.col).map(move |col| SimpleCellAddress::new(self.sheet(), col, row))
    }

    /// Row-major walk over every address. Only sensible for finite ranges.
    pub fn addresses(&self) -> impl Iterator<Item = SimpleCellAddress> + '_ {
        let sheet = self.sheet();
        (self.start.row..=self.end.row).flat_map(move |row| {
            (self.start.col..=self.end.col).map(move |col| SimpleCellAddress::new(sheet, col, row))
        })
    }
}
