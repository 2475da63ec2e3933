//! Evidence fusion and convergence core for open-source investigations.
//!
//! Everything here is synchronous and free of I/O. The service crate feeds retrieved
//! documents and extractor candidates in; this crate owns the canonical state.

pub mod candidate;
pub mod convergence;
pub mod fusion;
pub mod model;
pub mod normalize;
pub mod planner;
pub mod snapshot;
pub mod time_serde;
pub mod validator;

mod error;

pub use error::{Error, Result};
