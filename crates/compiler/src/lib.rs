//! Build driver, benchmark session and CLI for the nmbench harness.

#[cfg(feature = "cli")]
pub mod cli;
pub mod error;
pub mod pipeline;
pub mod session;
pub mod workspace;

#[cfg(feature = "cli")]
pub use cli::*;
pub use error::*;
pub use pipeline::*;
pub use session::*;
pub use workspace::*;
