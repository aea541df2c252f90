//! Database module for PostgreSQL persistence.

mod pool;
mod progress;
mod results;

pub use pool::*;
pub use progress::*;
pub use results::*;
