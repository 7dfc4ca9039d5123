//! Edge-list input and result output

pub mod parser;
pub mod writer;

pub use parser::{EdgeParser, ParseError};
pub use writer::ResultWriter;
