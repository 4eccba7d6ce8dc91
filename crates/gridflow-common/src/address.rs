//! Cell, column and row addressing.
//!
//! Two families live here:
//! - **absolute** ([`SimpleCellAddress`]): resolved coordinates on a sheet
//! - **formula-relative** ([`CellAddress`], [`ColumnAddress`], [`RowAddress`]):
//!   what a formula embeds, resolved against the formula's own position
//!
//! All coordinates are zero-based.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub type SheetId = u32;

/// Last addressable row (zero-based). Also the open end of whole-column ranges.
pub const MAX_ROW: u32 = 1_048_575;
/// Last addressable column (zero-based). Also the open end of whole-row ranges.
pub const MAX_COL: u32 = 16_383;

/// Resolved coordinates of one cell.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SimpleCellAddress {
    pub sheet: SheetId,
    pub col: u32,
    pub row: u32,
}

impl SimpleCellAddress {
    pub const fn new(sheet: SheetId, col: u32, row: u32) -> Self {
        Self { sheet, col, row }
    }

    /// Build from signed coordinates, rejecting anything outside the grid.
    pub fn from_signed(sheet: SheetId, col: i64, row: i64) -> Option<Self> {
        if col < 0 || row < 0 || col > MAX_COL as i64 || row > MAX_ROW as i64 {
            return None;
        }
        Some(Self::new(sheet, col as u32, row as u32))
    }

    /// The address `(dx, dy)` away, possibly on another sheet.
    pub fn moved(&self, to_sheet: SheetId, dx: i64, dy: i64) -> Option<Self> {
        Self::from_signed(to_sheet, self.col as i64 + dx, self.row as i64 + dy)
    }

    pub fn is_within_grid(&self) -> bool {
        self.col <= MAX_COL && self.row <= MAX_ROW
    }
}

impl fmt::Display for SimpleCellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}!{}{}", self.sheet, column_label(self.col), self.row + 1)
    }
}

/// `0 -> A`, `25 -> Z`, `26 -> AA`.
pub fn column_label(col: u32) -> String {
    let mut n = col as u64 + 1;
    let mut label = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        label.push(b'A' + rem);
        n = (n - 1) / 26;
    }
    label.reverse();
    String::from_utf8(label).unwrap_or_default()
}

/// Inverse of [`column_label`]; `None` for anything that is not `[A-Za-z]+`.
pub fn column_index(label: &str) -> Option<u32> {
    if label.is_empty() {
        return None;
    }
    let mut col: u64 = 0;
    for b in label.bytes() {
        if !b.is_ascii_alphabetic() {
            return None;
        }
        col = col * 26 + (b.to_ascii_uppercase() - b'A' + 1) as u64;
        if col > MAX_COL as u64 + 1 {
            return None;
        }
    }
    Some((col - 1) as u32)
}

/// Which sheet an embedded reference points to.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SheetRef {
    /// The sheet the formula itself lives on.
    Current,
    Id(SheetId),
}

impl SheetRef {
    pub fn resolve(self, base: SheetId) -> SheetId {
        match self {
            SheetRef::Current => base,
            SheetRef::Id(id) => id,
        }
    }
}

/// One coordinate of an embedded reference.
///
/// When `absolute` the index is the grid position (`$B`); otherwise it is the
/// offset from the formula's own column or row.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AxisRef {
    pub index: i64,
    pub absolute: bool,
}

impl AxisRef {
    pub const fn absolute(index: i64) -> Self {
        Self {
            index,
            absolute: true,
        }
    }

    pub const fn relative(offset: i64) -> Self {
        Self {
            index: offset,
            absolute: false,
        }
    }

    /// Grid position of this coordinate seen from `base`.
    #[inline]
    pub fn resolve(self, base: u32) -> i64 {
        if self.absolute {
            self.index
        } else {
            base as i64 + self.index
        }
    }

    #[inline]
    pub fn shift_absolute(self, by: i64) -> Self {
        if self.absolute {
            Self::absolute(self.index + by)
        } else {
            self
        }
    }

    #[inline]
    pub fn shift_relative(self, by: i64) -> Self {
        if self.absolute {
            self
        } else {
            Self::relative(self.index + by)
        }
    }

    /// Re-encode so that, seen from `new_base`, this coordinate lands on `target`.
    #[inline]
    pub fn retarget(self, target: i64, new_base: u32) -> Self {
        if self.absolute {
            Self::absolute(target)
        } else {
            Self::relative(target - new_base as i64)
        }
    }
}

/// A single-cell reference as embedded in a formula.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellAddress {
    pub sheet: SheetRef,
    pub col: AxisRef,
    pub row: AxisRef,
}

impl CellAddress {
    pub const fn new(sheet: SheetRef, col: AxisRef, row: AxisRef) -> Self {
        Self { sheet, col, row }
    }

    /// `B3` written in a formula at `base`.
    pub fn relative_to(base: SimpleCellAddress, target: SimpleCellAddress) -> Self {
        let sheet = if base.sheet == target.sheet {
            SheetRef::Current
        } else {
            SheetRef::Id(target.sheet)
        };
        Self::new(
            sheet,
            AxisRef::relative(target.col as i64 - base.col as i64),
            AxisRef::relative(target.row as i64 - base.row as i64),
        )
    }

    /// `$B$3`.
    pub fn absolute(sheet: SheetRef, col: u32, row: u32) -> Self {
        Self::new(
            sheet,
            AxisRef::absolute(col as i64),
            AxisRef::absolute(row as i64),
        )
    }

    pub fn sheet_at(&self, base: SimpleCellAddress) -> SheetId {
        self.sheet.resolve(base.sheet)
    }

    /// Signed `(sheet, col, row)`; may lie outside the grid.
    pub fn resolve_signed(&self, base: SimpleCellAddress) -> (SheetId, i64, i64) {
        (
            self.sheet_at(base),
            self.col.resolve(base.col),
            self.row.resolve(base.row),
        )
    }

    pub fn to_simple(&self, base: SimpleCellAddress) -> Option<SimpleCellAddress> {
        let (sheet, col, row) = self.resolve_signed(base);
        SimpleCellAddress::from_signed(sheet, col, row)
    }

    pub fn shift_absolute(&self, dx: i64, dy: i64) -> Self {
        Self::new(self.sheet, self.col.shift_absolute(dx), self.row.shift_absolute(dy))
    }

    pub fn shift_relative(&self, dx: i64, dy: i64) -> Self {
        Self::new(self.sheet, self.col.shift_relative(dx), self.row.shift_relative(dy))
    }

    /// Follow a cell that moved by `(dx, dy)` onto `to_sheet`, seen from a
    /// formula on `formula_sheet` that stays where it is.
    pub fn moved(&self, formula_sheet: SheetId, to_sheet: SheetId, dx: i64, dy: i64) -> Self {
        let sheet = match self.sheet {
            SheetRef::Current if to_sheet == formula_sheet => SheetRef::Current,
            _ => SheetRef::Id(to_sheet),
        };
        Self::new(
            sheet,
            AxisRef {
                index: self.col.index + dx,
                absolute: self.col.absolute,
            },
            AxisRef {
                index: self.row.index + dy,
                absolute: self.row.absolute,
            },
        )
    }
}

/// Column coordinate of a whole-column range such as `A:C`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnAddress {
    pub sheet: SheetRef,
    pub col: AxisRef,
}

impl ColumnAddress {
    pub const fn new(sheet: SheetRef, col: AxisRef) -> Self {
        Self { sheet, col }
    }
}

/// Row coordinate of a whole-row range such as `2:5`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowAddress {
    pub sheet: SheetRef,
    pub row: AxisRef,
}

impl RowAddress {
    pub const fn new(sheet: SheetRef, row: AxisRef) -> Self {
        Self { sheet, row }
    }
}

/// A contiguous block of rows or columns on one sheet.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub sheet: SheetId,
    pub start: u32,
    pub count: u32,
}

impl Span {
    pub const fn new(sheet: SheetId, start: u32, count: u32) -> Self {
        Self {
            sheet,
            start,
            count,
        }
    }

    /// Last index covered; only meaningful when `count > 0`.
    pub fn end(&self) -> u32 {
        self.start + self.count.saturating_sub(1)
    }

    pub fn contains(&self, index: u32) -> bool {
        index >= self.start && index - self.start < self.count
    }

    /// Sort and merge `(start, count)` pairs for removal. Overlapping or
    /// touching pairs merge; empty pairs are dropped.
    pub fn normalize_removed(sheet: SheetId, spans: &[(u32, u32)]) -> Vec<Span> {
        let mut sorted: Vec<(u32, u32)> = spans.iter().copied().filter(|&(_, n)| n > 0).collect();
        sorted.sort_unstable();
        let mut merged: Vec<(u32, u32)> = Vec::with_capacity(sorted.len());
        for (start, count) in sorted {
            match merged.last_mut() {
                Some((last_start, last_count)) if start <= *last_start + *last_count => {
                    let end = (*last_start + *last_count).max(start + count);
                    *last_count = end - *last_start;
                }
                _ => merged.push((start, count)),
            }
        }
        // Apply from the bottom so earlier spans keep their indices.
        merged
            .into_iter()
            .rev()
            .map(|(start, count)| Span::new(sheet, start, count))
            .collect()
    }

    /// Sort `(start, count)` pairs for insertion. Pairs at the same start
    /// merge; later pairs are shifted by what was inserted before them.
    pub fn normalize_added(sheet: SheetId, spans: &[(u32, u32)]) -> Vec<Span> {
        let mut sorted: Vec<(u32, u32)> = spans.iter().copied().filter(|&(_, n)| n > 0).collect();
        sorted.sort_unstable();
        let mut merged: Vec<(u32, u32)> = Vec::with_capacity(sorted.len());
        for (start, count) in sorted {
            match merged.last_mut() {
                Some((last_start, last_count)) if *last_start == start => {
                    *last_count = (*last_count).max(count);
                }
                _ => merged.push((start, count)),
            }
        }
        let mut shift = 0;
        merged
            .into_iter()
            .map(|(start, count)| {
                let span = Span::new(sheet, start + shift, count);
                shift += count;
                span
            })
            .collect()
    }
}
