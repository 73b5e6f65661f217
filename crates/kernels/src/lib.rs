//! Kernel configuration, templates and variants for the nmbench harness.

pub mod config;
pub mod error;
pub mod registry;
pub mod template;

pub use config::*;
pub use error::*;
pub use registry::*;
pub use template::*;
