use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Position of a cell on the grid, zero-based.
///
/// Displays and parses as the familiar `"B12"` form: column letters
/// followed by a one-based row number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellAddress {
    pub row: usize,
    pub col: usize,
}

impl CellAddress {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Parses a reference like `"A1"` or `"aa12"` (case-insensitive).
    ///
    /// Returns `None` for anything that is not letters followed by
    /// digits. Grid bounds are not checked here; see
    /// [`Spreadsheet::contains`].
    pub fn parse(cell_ref: &str) -> Option<Self> {
        let mut col_str = String::new();
        let mut row_str = String::new();

        for ch in cell_ref.chars() {
            if ch.is_ascii_alphabetic() {
                if !row_str.is_empty() {
                    return None;
                }
                col_str.push(ch.to_ascii_uppercase());
            } else if ch.is_ascii_digit() {
                row_str.push(ch);
            } else {
                return None;
            }
        }

        if col_str.is_empty() || row_str.is_empty() {
            return None;
        }

        let col = Self::column_str_to_index(&col_str)?;
        let row = row_str.parse::<usize>().ok()?.checked_sub(1)?;

        Some(Self { row, col })
    }

    /// Converts a zero-based column index to its letter label (0 -> "A",
    /// 25 -> "Z", 26 -> "AA").
    pub fn column_label(col: usize) -> String {
        let mut result = String::new();
        let mut c = col;
        loop {
            result = char::from(b'A' + (c % 26) as u8).to_string() + &result;
            if c < 26 {
                break;
            }
            c = c / 26 - 1;
        }
        result
    }

    fn column_str_to_index(col_str: &str) -> Option<usize> {
        let mut result = 0usize;
        for ch in col_str.chars() {
            if !ch.is_ascii_alphabetic() {
                return None;
            }
            // Checked: formula text is untrusted, and enough letters
            // would overflow the running total
            result = result
                .checked_mul(26)?
                .checked_add(ch as usize - 'A' as usize + 1)?;
        }
        result.checked_sub(1)
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::column_label(self.col), self.row + 1)
    }
}

/// A cell's display value: a plain number or literal text.
///
/// Serialized untagged so the persisted JSON mapping holds bare numbers
/// and strings, matching the shell's file format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Permissive numeric coercion: numbers as-is, parseable text as its
    /// number, everything else (including empty) as 0.
    pub fn as_number(&self) -> f64 {
        match self {
            CellValue::Number(n) => *n,
            CellValue::Text(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Text(s) if s.is_empty())
    }
}

impl Default for CellValue {
    fn default() -> Self {
        CellValue::Text(String::new())
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Contents of one cell.
///
/// `formula` holds the raw input including the leading `=` and is present
/// only while the cell's content is a formula; `value` is then the most
/// recent evaluation result. For literal cells `value` is the user input
/// verbatim and `formula` is `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellData {
    pub value: CellValue,
    pub formula: Option<String>,
}

/// The sparse cell grid owned by one sheets window.
///
/// Cells never written are absent from the map and read back as empty.
#[derive(Debug, Clone)]
pub struct Spreadsheet {
    cells: BTreeMap<CellAddress, CellData>,
    pub rows: usize,
    pub cols: usize,
}

impl Default for Spreadsheet {
    fn default() -> Self {
        Self {
            cells: BTreeMap::new(),
            rows: 100,
            cols: 26,
        }
    }
}

impl Spreadsheet {
    /// Whether the address falls inside the grid bounds.
    pub fn contains(&self, address: CellAddress) -> bool {
        address.row < self.rows && address.col < self.cols
    }

    pub fn get_cell(&self, address: CellAddress) -> CellData {
        self.cells.get(&address).cloned().unwrap_or_default()
    }

    pub fn set_cell(&mut self, address: CellAddress, data: CellData) {
        self.cells.insert(address, data);
    }

    pub fn remove_cell(&mut self, address: CellAddress) {
        self.cells.remove(&address);
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Numeric view of a cell for formula evaluation; absent cells read
    /// as 0.
    pub fn numeric_value(&self, address: CellAddress) -> f64 {
        self.cells
            .get(&address)
            .map(|cell| cell.value.as_number())
            .unwrap_or(0.0)
    }

    /// Iterates the cells currently holding a formula.
    pub fn formula_cells(&self) -> impl Iterator<Item = (CellAddress, &str)> {
        self.cells.iter().filter_map(|(addr, cell)| {
            cell.formula.as_deref().map(|formula| (*addr, formula))
        })
    }

    /// Bottom-right corner of the used area, if any cell is set.
    pub fn used_extent(&self) -> Option<(usize, usize)> {
        let mut extent = None;
        for addr in self.cells.keys() {
            let (max_row, max_col) = extent.get_or_insert((addr.row, addr.col));
            *max_row = (*max_row).max(addr.row);
            *max_col = (*max_col).max(addr.col);
        }
        extent
    }

    /// Exports the flat persistence mapping: `"A1"` -> display value,
    /// plus `"A1_formula"` -> raw formula text for formula cells.
    pub fn serialize(&self) -> BTreeMap<String, CellValue> {
        let mut mapping = BTreeMap::new();
        for (addr, cell) in &self.cells {
            mapping.insert(addr.to_string(), cell.value.clone());
            if let Some(formula) = &cell.formula {
                mapping.insert(format!("{}_formula", addr), CellValue::Text(formula.clone()));
            }
        }
        mapping
    }

    /// Replaces the grid contents with a flat persistence mapping.
    ///
    /// Keys that do not parse as in-grid addresses are skipped, as is a
    /// `_formula` key without a matching value key (a formula cell always
    /// carries its latest evaluation result).
    pub fn load(&mut self, mapping: BTreeMap<String, CellValue>) {
        self.cells.clear();
        let mut formulas: Vec<(CellAddress, String)> = Vec::new();

        for (key, value) in mapping {
            if let Some(base) = key.strip_suffix("_formula") {
                if let Some(addr) = self.parse_grid_address(base) {
                    formulas.push((addr, value.to_string()));
                }
            } else if let Some(addr) = self.parse_grid_address(&key) {
                self.cells.insert(addr, CellData { value, formula: None });
            }
        }

        for (addr, formula) in formulas {
            if let Some(cell) = self.cells.get_mut(&addr) {
                cell.formula = Some(formula);
            }
        }
    }

    fn parse_grid_address(&self, key: &str) -> Option<CellAddress> {
        CellAddress::parse(key).filter(|addr| self.contains(*addr))
    }
}
