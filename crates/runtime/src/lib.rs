//! Kernel execution, log parsing and latency aggregation.

pub mod aggregate;
pub mod error;
pub mod executor;
pub mod parser;
pub mod process;

pub use aggregate::*;
pub use error::*;
pub use executor::*;
pub use parser::*;
pub use process::*;
