//! Request handlers for sync cycles and mirror reads.

mod mirror;
mod sync;

pub use mirror::*;
pub use sync::*;
