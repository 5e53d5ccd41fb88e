//! Spreadsheet layout for exported models
//!
//! Columns are 1-based (A = 1). Period `i` of the timeline lives in column
//! `first_data_column + i`; each reference key owns one row on one sheet.

use crate::error::{Error, Result};
use crate::reference::ReferenceKey;
use ahash::AHashMap;

/// Default column of the first period (E); A–D hold labels
pub const FIRST_DATA_COLUMN: u32 = 5;

/// Largest addressable spreadsheet column (XFD)
pub const MAX_COLUMN: u32 = 16_384;

/// Convert a 1-based column number to letters (1 = A, 26 = Z, 27 = AA)
pub fn column_to_letters(col: u32) -> String {
    let mut letters = Vec::new();
    let mut n = col;

    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((rem as u8 + b'A') as char);
        n = (n - 1) / 26;
    }

    letters.iter().rev().collect()
}

/// Convert column letters to a 1-based column number (A = 1)
pub fn letters_to_column(letters: &str) -> Result<u32> {
    if letters.is_empty() {
        return Err(Error::InvalidColumn("empty column letters".into()));
    }

    let mut col: u32 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return Err(Error::InvalidColumn(letters.to_string()));
        }
        col = col
            .saturating_mul(26)
            .saturating_add(c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }

    if col > MAX_COLUMN {
        return Err(Error::ColumnOutOfBounds(col, MAX_COLUMN));
    }

    Ok(col)
}

/// Where a reference's row lives
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellLocation {
    pub sheet: String,
    /// 1-based row
    pub row: u32,
}

impl CellLocation {
    pub fn new(sheet: impl Into<String>, row: u32) -> Self {
        Self {
            sheet: sheet.into(),
            row,
        }
    }
}

/// Frozen mapping from reference keys to spreadsheet rows
#[derive(Debug, Clone)]
pub struct SheetLayout {
    first_data_column: u32,
    entries: AHashMap<ReferenceKey, CellLocation>,
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl SheetLayout {
    pub fn new() -> Self {
        Self {
            first_data_column: FIRST_DATA_COLUMN,
            entries: AHashMap::new(),
        }
    }

    /// Use a different column for the first period
    pub fn with_first_data_column(mut self, col: u32) -> Self {
        self.first_data_column = col.max(1);
        self
    }

    /// Start a layout that assigns rows sequentially per sheet
    pub fn builder() -> LayoutBuilder {
        LayoutBuilder::new()
    }

    pub fn first_data_column(&self) -> u32 {
        self.first_data_column
    }

    /// 1-based column of period `index`
    pub fn period_column(&self, index: usize) -> u32 {
        self.first_data_column + index as u32
    }

    /// Place `key` at `row` of `sheet`
    pub fn insert(&mut self, key: ReferenceKey, sheet: impl Into<String>, row: u32) {
        self.entries.insert(key, CellLocation::new(sheet, row));
    }

    pub fn get(&self, key: &ReferenceKey) -> Option<&CellLocation> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &ReferenceKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builds a [`SheetLayout`] by appending rows to sheets in order
#[derive(Debug, Clone)]
pub struct LayoutBuilder {
    layout: SheetLayout,
    start_row: u32,
    next_row: AHashMap<String, u32>,
}

impl LayoutBuilder {
    fn new() -> Self {
        Self {
            layout: SheetLayout::new(),
            start_row: 2,
            next_row: AHashMap::new(),
        }
    }

    /// First row used on each sheet (default 2, leaving a header row)
    pub fn start_row(mut self, row: u32) -> Self {
        self.start_row = row.max(1);
        self
    }

    pub fn first_data_column(mut self, col: u32) -> Self {
        self.layout = self.layout.with_first_data_column(col);
        self
    }

    /// Append `key` as the next row of `sheet`
    pub fn place(mut self, key: ReferenceKey, sheet: &str) -> Self {
        let row = self
            .next_row
            .entry(sheet.to_string())
            .or_insert(self.start_row);
        let assigned = *row;
        *row += 1;
        self.layout.insert(key, sheet, assigned);
        self
    }

    pub fn build(self) -> SheetLayout {
        self.layout
    }
}
