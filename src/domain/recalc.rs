//! Dependent-cell recalculation.
//!
//! Keeps the cell-store invariant: whenever a cell's display value
//! changes, every formula cell that references it (directly or through a
//! chain of other formulas) is re-evaluated, so no stale value survives
//! an edit. References are extracted by parsing each stored formula;
//! propagation runs in topological order over the affected cells so
//! multi-hop chains settle in a single pass. Cells caught in a reference
//! cycle are marked with the `#CYCLE` sentinel instead of looping.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::models::{CellAddress, CellValue, Spreadsheet};
use super::parser::{Expr, Parser};
use super::services::{CYCLE_SENTINEL, Evaluation, FormulaEvaluator};

/// Extracts the set of cell addresses a formula reads.
///
/// Ranges expand to every cell in their min/max-normalized rectangle,
/// clamped to the grid. Formulas that do not parse (including literal
/// fallbacks) read nothing.
pub fn formula_references(sheet: &Spreadsheet, formula: &str) -> BTreeSet<CellAddress> {
    let mut references = BTreeSet::new();

    let Some(expr) = formula.strip_prefix('=') else {
        return references;
    };
    if let Ok(ast) = Parser::new(expr.trim()).and_then(|mut parser| parser.parse()) {
        collect_references(sheet, &ast, &mut references);
    }

    references
}

fn collect_references(sheet: &Spreadsheet, expr: &Expr, out: &mut BTreeSet<CellAddress>) {
    match expr {
        Expr::CellRef(cell_ref) => {
            if let Some(addr) = CellAddress::parse(cell_ref) {
                out.insert(addr);
            }
        }
        Expr::Range(start_cell, end_cell) => {
            if let (Some(start), Some(end)) =
                (CellAddress::parse(start_cell), CellAddress::parse(end_cell))
            {
                let top = start.row.min(end.row);
                let bottom = start.row.max(end.row).min(sheet.rows - 1);
                let left = start.col.min(end.col);
                let right = start.col.max(end.col).min(sheet.cols - 1);
                for row in top..=bottom {
                    for col in left..=right {
                        out.insert(CellAddress::new(row, col));
                    }
                }
            }
        }
        Expr::Binary { left, right, .. } => {
            collect_references(sheet, left, out);
            collect_references(sheet, right, out);
        }
        Expr::Unary { operand, .. } => {
            collect_references(sheet, operand, out);
        }
        Expr::FunctionCall { args, .. } => {
            for arg in args {
                collect_references(sheet, arg, out);
            }
        }
        Expr::Number(_) => {}
    }
}

/// Re-evaluates every formula cell affected by a change to `changed`.
///
/// The affected set is found by walking reverse dependency edges from the
/// changed address, then re-evaluated in topological order (Kahn). A cell
/// whose re-evaluation fails keeps its previous display value; the scan
/// of the remaining cells continues regardless. Cells the topological
/// pass cannot order participate in (or sit behind) a cycle and get the
/// `#CYCLE` sentinel. Stored formulas are never modified, only display
/// values.
pub fn recalculate_dependents(sheet: &mut Spreadsheet, changed: CellAddress) {
    let refs_by_cell: BTreeMap<CellAddress, BTreeSet<CellAddress>> = sheet
        .formula_cells()
        .map(|(addr, formula)| (addr, formula_references(sheet, formula)))
        .collect();

    // Formula cells transitively reachable from the change. A formula in
    // the changed cell itself joins only via a loop back to it.
    let mut affected = BTreeSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(changed);
    while let Some(source) = queue.pop_front() {
        for (addr, references) in &refs_by_cell {
            if references.contains(&source) && affected.insert(*addr) {
                queue.push_back(*addr);
            }
        }
    }
    if affected.is_empty() {
        return;
    }

    let mut in_degree: BTreeMap<CellAddress, usize> = affected
        .iter()
        .map(|addr| {
            let degree = refs_by_cell[addr]
                .iter()
                .filter(|reference| affected.contains(reference))
                .count();
            (*addr, degree)
        })
        .collect();

    let mut ready: VecDeque<CellAddress> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(addr, _)| *addr)
        .collect();
    let mut settled = BTreeSet::new();

    while let Some(addr) = ready.pop_front() {
        settled.insert(addr);
        refresh_cell(sheet, addr);

        for (dependent, references) in &refs_by_cell {
            if affected.contains(dependent)
                && !settled.contains(dependent)
                && references.contains(&addr)
            {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push_back(*dependent);
                    }
                }
            }
        }
    }

    for addr in affected.difference(&settled) {
        let mut cell = sheet.get_cell(*addr);
        if cell.formula.is_some() {
            cell.value = CellValue::Text(CYCLE_SENTINEL.to_string());
            sheet.set_cell(*addr, cell);
        }
    }
}

/// Re-evaluates one formula cell in place, keeping the old display value
/// when evaluation fails.
fn refresh_cell(sheet: &mut Spreadsheet, addr: CellAddress) {
    let mut cell = sheet.get_cell(addr);
    let Some(formula) = cell.formula.clone() else {
        return;
    };

    let evaluation = FormulaEvaluator::new(sheet).evaluate_formula(&formula);
    match evaluation {
        Evaluation::Number(n) => {
            cell.value = CellValue::Number(n);
            sheet.set_cell(addr, cell);
        }
        Evaluation::Literal(text) => {
            cell.value = CellValue::Text(text);
            sheet.set_cell(addr, cell);
        }
        Evaluation::Error => {}
    }
}
