pub mod extract;
pub mod render;
pub mod resolve;

pub use extract::*;
pub use render::*;
pub use resolve::*;
