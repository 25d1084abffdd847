pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;

#[cfg(test)]
pub(crate) mod test_support;


pub use error::*;
pub use models::*;
