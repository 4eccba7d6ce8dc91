#![cfg(test)]

pub mod interpreter;
pub mod parser;

pub use interpreter::TestInterpreter;
pub use parser::{TestParser, cell};
