pub mod address;
pub mod ast;
pub mod error;
pub mod range;
pub mod value;

pub use address::*;
pub use ast::*;
pub use error::*;
pub use range::*;
pub use value::*;
