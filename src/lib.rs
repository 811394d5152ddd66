pub mod brewing;
pub mod controller;
pub mod protocol;
pub mod server;
pub mod state;
pub mod system;
pub mod types;

pub use brewing::*;
pub use types::*;
