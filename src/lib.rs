#[macro_use]
extern crate lazy_static;

pub mod align;
pub mod atoms;
pub mod commands;
pub mod constants;
pub mod error;
pub mod extract;
pub mod fitting;
pub mod mdm;
pub mod pdb;
pub mod qt;
pub mod report;
pub mod session;
pub mod zones;

pub use commands::{execute_line, run_script, Outcome};
pub use error::{FitError, Result};
pub use session::Session;
