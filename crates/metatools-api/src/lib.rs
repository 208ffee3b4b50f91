pub mod error;
pub mod handlers;
pub mod query;
pub mod routes;
pub mod schematic;
pub mod server;
pub mod state;
pub mod upgrade;

pub use error::*;
pub use routes::*;
pub use server::*;
pub use state::*;
