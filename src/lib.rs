pub mod api;
pub mod config;
pub mod error;
pub mod observability;
pub mod server;

mod state;

pub use config::*;
pub use state::*;
