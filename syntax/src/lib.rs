#[macro_use]
mod macros;
mod parse;
pub use parse::{parse, Error};
pub mod ast;
mod shell;
