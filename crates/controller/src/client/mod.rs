//! Collaborator contracts the engine consumes

pub mod output;
pub mod service;
pub mod state;

pub use output::{OutputDir, artifacts};
pub use service::*;
pub use state::*;
