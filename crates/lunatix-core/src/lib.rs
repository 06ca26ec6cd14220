pub mod config;
pub mod error;
pub mod types;

pub use config::LunatixConfig;
pub use error::{LunatixError, Result};
pub use types::*;
