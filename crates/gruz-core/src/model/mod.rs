//! Domain entities and the inputs that create or change them.

pub mod filter;
pub mod types;

pub use filter::{CustomerFilter, FloatRange, OrderFilter};
pub use types::*;
