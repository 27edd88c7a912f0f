pub mod models;
pub mod parser;
pub mod services;
pub mod recalc;
pub mod errors;

pub use models::*;
pub use services::*;
pub use recalc::*;
pub use errors::*;
