pub mod config;
pub mod fetch;
pub mod fixtures;
pub mod harness;
pub mod observability;
pub mod taxonomy;
pub mod transform;

pub use harness::{Harness, Mode, RunReport};
pub use transform::{TransformError, TransformOptions};
