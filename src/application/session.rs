//! Per-window spreadsheet session.
//!
//! A [`SheetSession`] owns the cell grid for one open sheets window and
//! exposes the boundary the shell's collaborators call: the grid
//! renderer commits edits through [`SheetSession::set_cell`] and paints
//! from [`SheetSession::get_cell`]; the file collaborators exchange the
//! flat persistence mapping through [`SheetSession::serialize`] and
//! [`SheetSession::load`]. Everything here runs synchronously inside the
//! caller's event handler; the session is created when the window opens
//! and dropped when it closes.

use std::collections::BTreeMap;

use crate::domain::{
    CellAddress, CellData, CellValue, DomainError, DomainResult, Evaluation, FormulaEvaluator,
    Spreadsheet, recalculate_dependents,
};

/// Spreadsheet state owned by one sheets window.
#[derive(Debug, Default)]
pub struct SheetSession {
    /// The cell grid; readable directly by the grid renderer.
    pub spreadsheet: Spreadsheet,
    /// Set on any content change, cleared by [`SheetSession::mark_saved`].
    dirty: bool,
}

impl SheetSession {
    /// Creates a session with an empty default-sized grid.
    pub fn new() -> Self {
        Self::default()
    }

    /// Commits a cell edit.
    ///
    /// Input starting with `=` is evaluated as a formula: a numeric
    /// result is stored together with the raw formula text; input the
    /// evaluator does not recognize keeps the formula and displays the
    /// text unchanged (defined fallback); an evaluation error stores the
    /// raw text as a plain literal. Anything not starting with `=` is a
    /// literal, and empty input clears the cell. After the store update,
    /// dependent formulas are recalculated so no stale value survives.
    ///
    /// # Errors
    ///
    /// [`DomainError::InvalidCellReference`] when the address does not
    /// parse or lies outside the grid.
    ///
    /// # Examples
    ///
    /// ```
    /// use desksheets::application::SheetSession;
    ///
    /// let mut session = SheetSession::new();
    /// session.set_cell("A1", "5").unwrap();
    /// session.set_cell("A2", "10").unwrap();
    /// session.set_cell("A3", "=A1+A2").unwrap();
    /// assert_eq!(session.get_cell("A3").value.to_string(), "15");
    /// ```
    pub fn set_cell(&mut self, address: &str, raw_input: &str) -> DomainResult<()> {
        let addr = self.resolve_address(address)?;

        if raw_input.is_empty() {
            self.spreadsheet.remove_cell(addr);
        } else if raw_input.starts_with('=') {
            let evaluation = FormulaEvaluator::new(&self.spreadsheet).evaluate_formula(raw_input);
            let data = match evaluation {
                Evaluation::Number(n) => CellData {
                    value: CellValue::Number(n),
                    formula: Some(raw_input.to_string()),
                },
                Evaluation::Literal(text) => CellData {
                    value: CellValue::Text(text),
                    formula: Some(raw_input.to_string()),
                },
                // Initial entry of an unevaluable formula falls back to
                // the raw text as a plain literal
                Evaluation::Error => CellData {
                    value: CellValue::Text(raw_input.to_string()),
                    formula: None,
                },
            };
            self.spreadsheet.set_cell(addr, data);
        } else {
            self.spreadsheet.set_cell(
                addr,
                CellData {
                    value: CellValue::Text(raw_input.to_string()),
                    formula: None,
                },
            );
        }

        recalculate_dependents(&mut self.spreadsheet, addr);
        self.dirty = true;
        Ok(())
    }

    /// Reads a cell for display; never-written and unparseable addresses
    /// read as an empty cell.
    pub fn get_cell(&self, address: &str) -> CellData {
        match CellAddress::parse(address) {
            Some(addr) => self.spreadsheet.get_cell(addr),
            None => CellData::default(),
        }
    }

    /// Empties the grid ("new spreadsheet").
    pub fn clear(&mut self) {
        self.spreadsheet.clear();
        self.dirty = true;
    }

    /// Exports the flat address-to-value persistence mapping.
    pub fn serialize(&self) -> BTreeMap<String, CellValue> {
        self.spreadsheet.serialize()
    }

    /// Replaces the grid contents from a persistence mapping.
    ///
    /// Display values and formulas are restored verbatim; a mapping
    /// produced by [`SheetSession::serialize`] restores identical
    /// observable state.
    pub fn load(&mut self, mapping: BTreeMap<String, CellValue>) {
        self.spreadsheet.load(mapping);
        self.dirty = false;
    }

    /// Whether the sheet changed since the last save or load.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Marks the current contents as persisted.
    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    fn resolve_address(&self, address: &str) -> DomainResult<CellAddress> {
        CellAddress::parse(address)
            .filter(|addr| self.spreadsheet.contains(*addr))
            .ok_or_else(|| DomainError::InvalidCellReference(address.to_string()))
    }
}
