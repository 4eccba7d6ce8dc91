//! Per-column value search index.
//!
//! For every `(sheet, column)` the index maps a cell value to the ascending
//! list of rows holding it. Row insertions and removals are not applied when
//! they happen: each value entry remembers the version it was last brought
//! up to date at and replays newer row edits of its sheet when touched.
//! Column edits, moves and sheet removal are applied straight away.

use gridflow_common::{AbsoluteCellRange, CellValue, SheetId, SimpleCellAddress, Span};
use rustc_hash::FxHashMap;

use super::graph::Axis;
use super::lazy::{LazyTransformService, Transformation};

#[derive(Debug, Clone, Default)]
struct ValueIndex {
    version: u64,
    rows: Vec<u32>,
}

type ColumnMap = FxHashMap<CellValue, ValueIndex>;

#[derive(Debug, Default)]
pub struct ColumnIndex {
    sheets: FxHashMap<SheetId, Vec<Option<ColumnMap>>>,
}

/// Values worth indexing: errors and blanks never match a lookup key.
fn indexable(value: &CellValue) -> bool {
    !matches!(value, CellValue::Empty | CellValue::Error(_))
}

/// Visit each scalar of `value` placed at `address`, spreading arrays.
fn for_each_scalar(
    value: &CellValue,
    address: SimpleCellAddress,
    mut f: impl FnMut(&CellValue, SimpleCellAddress),
) {
    match value {
        CellValue::Array(rows) => {
            for (dy, row) in rows.iter().enumerate() {
                for (dx, v) in row.iter().enumerate() {
                    if let Some(at) = address.moved(address.sheet, dx as i64, dy as i64) {
                        f(v, at);
                    }
                }
            }
        }
        scalar => f(scalar, address),
    }
}

impl ColumnIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, lazy: &LazyTransformService, value: &CellValue, address: SimpleCellAddress) {
        for_each_scalar(value, address, |v, at| {
            if indexable(v) {
                self.add_single(lazy, v, at);
            }
        });
    }

    pub fn remove(&mut self, lazy: &LazyTransformService, value: &CellValue, address: SimpleCellAddress) {
        for_each_scalar(value, address, |v, at| {
            if indexable(v) {
                self.remove_single(lazy, v, at);
            }
        });
    }

    pub fn change(
        &mut self,
        lazy: &LazyTransformService,
        old: &CellValue,
        new: &CellValue,
        address: SimpleCellAddress,
    ) {
        if old == new {
            return;
        }
        self.remove(lazy, old, address);
        self.add(lazy, new, address);
    }

    /// First row in `start_row..=end_row` of `(sheet, col)` holding `key`.
    pub fn find(
        &mut self,
        lazy: &LazyTransformService,
        key: &CellValue,
        sheet: SheetId,
        col: u32,
        start_row: u32,
        end_row: u32,
    ) -> Option<u32> {
        self.ensure_recent(lazy, sheet, col, key);
        let rows = &self.column(sheet, col)?.get(key)?.rows;
        let i = rows.partition_point(|r| *r < start_row);
        rows.get(i).copied().filter(|r| *r <= end_row)
    }

    pub fn find_in_range(
        &mut self,
        lazy: &LazyTransformService,
        key: &CellValue,
        range: &AbsoluteCellRange,
    ) -> Option<u32> {
        self.find(
            lazy,
            key,
            range.sheet(),
            range.start.col,
            range.start.row,
            range.end.row,
        )
    }

    pub fn add_columns(&mut self, span: Span) {
        let Some(columns) = self.sheets.get_mut(&span.sheet) else {
            return;
        };
        let at = (span.start as usize).min(columns.len());
        columns.splice(at..at, std::iter::repeat_n(None, span.count as usize));
    }

    pub fn remove_columns(&mut self, span: Span) {
        let Some(columns) = self.sheets.get_mut(&span.sheet) else {
            return;
        };
        let start = (span.start as usize).min(columns.len());
        let end = (span.start as usize + span.count as usize).min(columns.len());
        columns.drain(start..end);
    }

    /// Re-file values that moved from `from` to `to`.
    pub fn move_values(
        &mut self,
        lazy: &LazyTransformService,
        moved: &[(SimpleCellAddress, SimpleCellAddress, CellValue)],
    ) {
        for (from, _, value) in moved {
            self.remove(lazy, value, *from);
        }
        for (_, to, value) in moved {
            self.add(lazy, value, *to);
        }
    }

    pub fn remove_sheet(&mut self, sheet: SheetId) {
        self.sheets.remove(&sheet);
    }

    /// Move everything indexed for `from` onto `to`.
    pub fn merge_sheet(&mut self, lazy: &LazyTransformService, from: SheetId, to: SheetId) {
        let Some(columns) = self.sheets.remove(&from) else {
            return;
        };
        for (col, map) in columns.into_iter().enumerate() {
            let Some(map) = map else { continue };
            for (value, entry) in map {
                let entry = Self::replay(lazy, from, entry);
                for row in entry.rows {
                    self.add_single(lazy, &value, SimpleCellAddress::new(to, col as u32, row));
                }
            }
        }
    }

    /// Oldest version any entry still has to catch up from.
    pub fn oldest_version(&self) -> Option<u64> {
        self.sheets
            .values()
            .flatten()
            .flatten()
            .flat_map(|map| map.values())
            .map(|entry| entry.version)
            .min()
    }

    fn column(&self, sheet: SheetId, col: u32) -> Option<&ColumnMap> {
        self.sheets.get(&sheet)?.get(col as usize)?.as_ref()
    }

    fn column_mut(&mut self, sheet: SheetId, col: u32) -> &mut ColumnMap {
        let columns = self.sheets.entry(sheet).or_default();
        let col = col as usize;
        if columns.len() <= col {
            columns.resize(col + 1, None);
        }
        columns[col].get_or_insert_with(ColumnMap::default)
    }

    fn add_single(&mut self, lazy: &LazyTransformService, value: &CellValue, at: SimpleCellAddress) {
        self.ensure_recent(lazy, at.sheet, at.col, value);
        let version = lazy.version();
        let entry = self
            .column_mut(at.sheet, at.col)
            .entry(value.clone())
            .or_insert_with(|| ValueIndex {
                version,
                rows: Vec::new(),
            });
        if let Err(i) = entry.rows.binary_search(&at.row) {
            entry.rows.insert(i, at.row);
        }
    }

    fn remove_single(&mut self, lazy: &LazyTransformService, value: &CellValue, at: SimpleCellAddress) {
        self.ensure_recent(lazy, at.sheet, at.col, value);
        let Some(columns) = self.sheets.get_mut(&at.sheet) else {
            return;
        };
        let Some(Some(map)) = columns.get_mut(at.col as usize) else {
            return;
        };
        if let Some(entry) = map.get_mut(value) {
            if let Ok(i) = entry.rows.binary_search(&at.row) {
                entry.rows.remove(i);
            }
            if entry.rows.is_empty() {
                map.remove(value);
            }
        }
        if map.is_empty() {
            columns[at.col as usize] = None;
        }
    }

    fn ensure_recent(&mut self, lazy: &LazyTransformService, sheet: SheetId, col: u32, value: &CellValue) {
        let Some(Some(map)) = self
            .sheets
            .get_mut(&sheet)
            .and_then(|c| c.get_mut(col as usize))
        else {
            return;
        };
        let Some(entry) = map.get_mut(value) else {
            return;
        };
        if lazy.is_current(entry.version) {
            return;
        }
        let stale = std::mem::take(entry);
        *entry = Self::replay(lazy, sheet, stale);
    }

    fn replay(lazy: &LazyTransformService, sheet: SheetId, mut entry: ValueIndex) -> ValueIndex {
        for transformation in lazy.since(entry.version) {
            let Transformation::Span(t) = transformation else {
                continue;
            };
            if t.axis != Axis::Rows || t.span.sheet != sheet {
                continue;
            }
            let span = t.span;
            if t.insert {
                let from = entry.rows.partition_point(|r| *r < span.start);
                for row in &mut entry.rows[from..] {
                    *row += span.count;
                }
            } else {
                let from = entry.rows.partition_point(|r| *r < span.start);
                let to = entry.rows.partition_point(|r| *r < span.start + span.count);
                entry.rows.drain(from..to);
                for row in &mut entry.rows[from..] {
                    *row -= span.count;
                }
            }
        }
        entry.version = lazy.version();
        entry
    }
}
