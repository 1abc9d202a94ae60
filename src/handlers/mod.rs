pub mod config;
pub mod grammar;

pub use config::*;
pub use grammar::*;
