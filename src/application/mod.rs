//! Application layer coordinating the domain engine for one sheets window.

pub mod session;

pub use session::*;
