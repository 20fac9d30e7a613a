//! The `utils` module holds definitions shared across `fanout`: the error
//! types and logging setup.

pub mod error;
pub mod logging;
