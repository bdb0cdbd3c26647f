//! Job shop scheduling: instances, schedule evaluation and solvers.

pub mod backend;
pub mod data;
pub mod error;
pub mod json;
pub mod parser;
pub mod solver;

pub use error::Error;
