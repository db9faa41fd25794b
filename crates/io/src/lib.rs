// File I/O for pipeline tables

pub mod csv;
pub mod load;

pub use crate::csv::{read_table, write_table};
pub use load::load_input;
