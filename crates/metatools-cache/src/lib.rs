pub mod disk;
pub mod stats;

pub use disk::*;
pub use stats::*;
