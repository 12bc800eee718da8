//! Small, self-contained helpers shared across the crate.

mod bitset;
mod dot;

pub use bitset::BitSet;
pub use dot::{escape_dot, DotWriter};
