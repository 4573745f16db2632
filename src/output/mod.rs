#![forbid(unsafe_code)]

pub mod table;

pub use table::{Table, truncate};
