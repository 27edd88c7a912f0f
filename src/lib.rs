//! desksheets - Spreadsheet Engine
//!
//! The spreadsheet core of the desktop-shell sheets application: cell
//! storage, formula evaluation, and dependent-cell recalculation.
//! The grid renderer and file dialogs live in the host shell and talk
//! to this crate through [`application::SheetSession`].

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
pub use application::*;
