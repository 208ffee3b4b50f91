pub mod cached;
pub mod client;

pub use cached::*;
pub use client::*;
