//! Repository interfaces.

mod resources;

pub use resources::*;
