pub mod native;
pub mod tester;
pub mod upgrader;

pub use native::*;
pub use tester::*;
pub use upgrader::*;
