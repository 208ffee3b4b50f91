pub mod client;
pub mod query;
pub mod relaxed;

pub use client::*;
pub use query::*;
pub use relaxed::*;
