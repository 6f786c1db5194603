pub mod app;
pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod queue;


pub use app::{AppController, CommandOutcome};
pub use error::*;
pub use models::*;
